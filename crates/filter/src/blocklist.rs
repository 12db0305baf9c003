//! Blocklist filter: drop lines matching any of a set of regexes.
//!
//! The pattern file carries one regex per line; blank lines and lines whose
//! first non-whitespace character is `#` are ignored. A pattern that fails
//! to compile is skipped with a warning rather than failing the run — a
//! years-old blocklist with one stale entry should not stop an indexing
//! pipeline.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use cdxj::io::{open_input, LineOutput};
use cdxj::CancelToken;
use regex::bytes::{Regex, RegexSet};
use tracing::{info, warn};

use crate::FilterStats;

/// A compiled set of block patterns.
pub struct Blocklist {
    set: RegexSet,
}

impl Blocklist {
    /// Loads and compiles patterns from `path`.
    ///
    /// Invalid patterns are warned about and skipped. An empty result (no
    /// usable patterns) is allowed; [`filter`] treats it as a no-op.
    pub fn load(path: &str) -> Result<Self> {
        let reader = open_input(path)?;
        let mut patterns = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("failed to read blocklist {path}"))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            // Validate each pattern individually so the warning can name it.
            match Regex::new(trimmed) {
                Ok(_) => patterns.push(trimmed.to_string()),
                Err(e) => {
                    warn!(line = idx + 1, pattern = trimmed, error = %e, "skipping invalid blocklist pattern");
                }
            }
        }

        if patterns.is_empty() {
            warn!(path, "blocklist has no usable patterns; filter is a no-op");
        }

        let set = RegexSet::new(&patterns).context("failed to compile blocklist pattern set")?;
        Ok(Self { set })
    }

    /// Builds a blocklist from already-validated pattern strings.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = RegexSet::new(patterns).context("failed to compile blocklist pattern set")?;
        Ok(Self { set })
    }

    /// Number of usable patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Whether `line` matches any block pattern.
    #[must_use]
    pub fn is_blocked(&self, line: &[u8]) -> bool {
        self.set.is_match(line)
    }
}

/// Streams `input` to `output`, dropping lines that match the blocklist.
///
/// Lines are matched as raw bytes (minus the trailing newline). Returns the
/// kept/dropped counters, which are also logged on completion.
pub fn filter(
    input: &str,
    blocklist: &Blocklist,
    output: &str,
    cancel: &CancelToken,
) -> Result<FilterStats> {
    let mut reader = open_input(input)?;
    let mut out = LineOutput::create(output)?;
    let stats = filter_stream(&mut reader, blocklist, &mut out, cancel)?;
    out.commit()?;

    info!(
        kept = stats.kept,
        dropped = stats.dropped,
        "blocklist filter complete"
    );
    Ok(stats)
}

/// Core keep-or-drop loop over open streams.
pub fn filter_stream(
    reader: &mut dyn BufRead,
    blocklist: &Blocklist,
    out: &mut dyn Write,
    cancel: &CancelToken,
) -> Result<FilterStats> {
    let mut stats = FilterStats::default();
    let mut buf = Vec::with_capacity(256);

    loop {
        cancel.check()?;

        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
            buf.pop();
        }

        if blocklist.is_blocked(&buf) {
            stats.dropped += 1;
        } else {
            out.write_all(&buf)?;
            out.write_all(b"\n")?;
            stats.kept += 1;
        }
    }

    Ok(stats)
}
