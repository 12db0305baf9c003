use thiserror::Error;

/// Errors shared across the CDXJ processing crates.
///
/// Operation-specific failures (missing shards, configuration conflicts)
/// live next to the code that raises them; these are the ones that can come
/// out of any streaming stage.
#[derive(Debug, Error)]
pub enum CdxError {
    /// A CDXJ line did not parse. Carries the source name and 1-based line
    /// number so pipeline errors point at the offending input.
    #[error("malformed line: {source_name}:{line_no}: {reason}")]
    MalformedLine {
        source_name: String,
        line_no: u64,
        reason: String,
    },

    /// A source violated the sorted invariant. `prev` and `next` are the
    /// offending keys, truncated for display.
    #[error("unsorted input: {source_name}:{line_no}: {prev:?} > {next:?}")]
    UnsortedInput {
        source_name: String,
        line_no: u64,
        prev: String,
        next: String,
    },

    /// The caller asked the operation to stop.
    #[error("cancelled")]
    Cancelled,
}

impl CdxError {
    /// Builds an `UnsortedInput` error, truncating the keys to keep the
    /// message readable when lines carry large JSON payloads.
    pub fn unsorted(source_name: &str, line_no: u64, prev: &[u8], next: &[u8]) -> Self {
        fn shorten(bytes: &[u8]) -> String {
            let s = String::from_utf8_lossy(bytes);
            let s = s.trim_end();
            if s.len() > 120 {
                let cut: String = s.chars().take(120).collect();
                format!("{cut}...")
            } else {
                s.to_string()
            }
        }
        CdxError::UnsortedInput {
            source_name: source_name.to_string(),
            line_no,
            prev: shorten(prev),
            next: shorten(next),
        }
    }
}
