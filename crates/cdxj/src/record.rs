//! CDXJ line codec.
//!
//! A CDXJ line is three space-separated parts: the SURT sort key, a 14-digit
//! timestamp, and a JSON object covering the rest of the line. Parsing
//! splits on the first two ASCII spaces only — the JSON payload may contain
//! spaces freely.

use serde_json::{Map, Value};

use crate::error::CdxError;

/// How the parser treats structurally incomplete lines.
///
/// Merge runs strict (a capture index with missing payloads is broken);
/// addfield and search run lenient so they can pass odd lines through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// A line with fewer than three parts is a [`CdxError::MalformedLine`].
    Strict,
    /// A missing JSON payload is tolerated and becomes an empty object.
    Lenient,
}

/// A parsed CDXJ record.
///
/// `json_text` preserves the raw payload bytes as read; `json` is the parsed
/// object (fresh and empty when the payload was absent). Formatting always
/// re-serializes `json` compactly, so key order is not preserved across a
/// parse/format round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct CdxjRecord {
    pub surt: String,
    pub timestamp: String,
    pub json_text: String,
    pub json: Map<String, Value>,
}

impl CdxjRecord {
    /// Parses one CDXJ line. The trailing newline (if any) is stripped.
    ///
    /// # Errors
    ///
    /// - Fewer than two parts (no timestamp): `MalformedLine` in both modes.
    /// - No JSON payload: `MalformedLine` in [`ParseMode::Strict`] only.
    /// - A payload that is not a JSON object: `MalformedLine` in both modes.
    pub fn parse(
        line: &str,
        mode: ParseMode,
        source_name: &str,
        line_no: u64,
    ) -> Result<Self, CdxError> {
        let line = line.trim_end_matches(['\n', '\r']);

        let malformed = |reason: &str| CdxError::MalformedLine {
            source_name: source_name.to_string(),
            line_no,
            reason: reason.to_string(),
        };

        let (surt, rest) = line
            .split_once(' ')
            .ok_or_else(|| malformed("missing timestamp field"))?;

        let (timestamp, json_text) = match rest.split_once(' ') {
            Some((ts, json)) => (ts, json),
            None if mode == ParseMode::Strict => {
                return Err(malformed("missing JSON payload"));
            }
            None => (rest, ""),
        };

        let json = if json_text.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(json_text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => return Err(malformed("payload is not a JSON object")),
                Err(e) => return Err(malformed(&format!("invalid JSON payload: {e}"))),
            }
        };

        Ok(Self {
            surt: surt.to_string(),
            timestamp: timestamp.to_string(),
            json_text: json_text.to_string(),
            json,
        })
    }

    /// Formats the record back into a CDXJ line (no trailing newline).
    ///
    /// The JSON object is serialized compactly. A record whose object is
    /// empty formats as `surt timestamp` with no third part, mirroring what
    /// a lenient parse of such a line produced.
    #[must_use]
    pub fn format(&self) -> String {
        if self.json.is_empty() {
            format!("{} {}", self.surt, self.timestamp)
        } else {
            // Serializing a Map<String, Value> cannot fail.
            let json = serde_json::to_string(&self.json).expect("JSON object serialization");
            format!("{} {} {}", self.surt, self.timestamp, json)
        }
    }
}

/// Returns the SURT key of a raw line: everything before the first space,
/// or the whole (trimmed) line when there is no space.
#[must_use]
pub fn surt_key_of(line: &str) -> &str {
    let line = line.trim_end_matches(['\n', '\r']);
    match line.split_once(' ') {
        Some((surt, _)) => surt,
        None => line,
    }
}

/// Returns `(surt, timestamp)` of a raw line without parsing the payload.
/// The timestamp is empty when the line has a single field.
#[must_use]
pub fn surt_and_timestamp(line: &str) -> (&str, &str) {
    let line = line.trim_end_matches(['\n', '\r']);
    match line.split_once(' ') {
        Some((surt, rest)) => {
            let ts = match rest.split_once(' ') {
                Some((ts, _)) => ts,
                None => rest,
            };
            (surt, ts)
        }
        None => (line, ""),
    }
}

/// Returns the pre-JSON portion of a raw line: everything before the first
/// `{`, trimmed. This is the key recorded in ZipNum index entries.
#[must_use]
pub fn prejson_key(line: &str) -> &str {
    let line = line.trim_end_matches(['\n', '\r']);
    match line.find('{') {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}
