//! # CDXJ — line codec and shared plumbing
//!
//! Core crate for the `cdxtools` workspace. Everything that touches a web
//! archive capture index speaks the CDXJ line format:
//!
//! ```text
//! <surt_key> <timestamp> <json_payload>
//!
//! pt,arquivo)/ 20231115120000 {"url":"https://arquivo.pt/","status":"200"}
//! └─ sort key ┘└─ 14 digits ─┘└─ open-ended JSON object ────────────────┘
//! ```
//!
//! A file is *sorted* iff the `(surt_key, timestamp)` sequence is
//! non-decreasing when compared as raw bytes. The SURT and timestamp are
//! ASCII; the JSON payload may contain UTF-8. All ordering comparisons in
//! this workspace treat the leading `surt timestamp` prefix as opaque bytes
//! so that results never depend on locale.
//!
//! ## What lives here
//!
//! | Module        | Purpose                                              |
//! |---------------|------------------------------------------------------|
//! | [`record`]    | Parse/format CDXJ lines, raw-line key helpers        |
//! | [`timestamp`] | Flexible-precision timestamp normalization           |
//! | [`error`]     | Shared error taxonomy (`MalformedLine`, ...)         |
//! | [`cancel`]    | Cooperative cancellation token                       |
//! | [`io`]        | Buffered line I/O, `-` stdio, atomic file outputs    |

pub mod cancel;
pub mod error;
pub mod io;
pub mod record;
pub mod timestamp;

pub use cancel::CancelToken;
pub use error::CdxError;
pub use record::{prejson_key, surt_key_of, surt_and_timestamp, CdxjRecord, ParseMode};
