//! Flexible-precision timestamp normalization.
//!
//! Capture timestamps are 14 decimal digits (`YYYYMMDDhhmmss`). Query
//! boundaries may be given at any precision — `2020`, `202006`, `20200615`,
//! down to the full 14 digits — and are padded against a low or high
//! template so that plain string comparison implements the range check.

/// Template completing a partial timestamp toward the earliest instant.
const LOWER_TEMPLATE: &[u8; 14] = b"00000101000000";

/// Template completing a partial timestamp toward the latest instant.
const UPPER_TEMPLATE: &[u8; 14] = b"99991231235959";

fn normalize(ts: &str, template: &[u8; 14]) -> String {
    let mut out = *template;
    for (slot, digit) in out.iter_mut().zip(ts.bytes().filter(u8::is_ascii_digit)) {
        *slot = digit;
    }
    // Template and digits are ASCII.
    String::from_utf8(out.to_vec()).expect("ASCII timestamp")
}

/// Pads a flexible timestamp to 14 digits as an inclusive lower bound.
///
/// `"2022"` becomes `"20220101000000"`.
#[must_use]
pub fn normalize_lower(ts: &str) -> String {
    normalize(ts, LOWER_TEMPLATE)
}

/// Pads a flexible timestamp to 14 digits as an inclusive upper bound.
///
/// `"2023"` becomes `"20231231235959"`.
#[must_use]
pub fn normalize_upper(ts: &str) -> String {
    normalize(ts, UPPER_TEMPLATE)
}
