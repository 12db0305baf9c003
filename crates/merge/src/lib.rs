//! # Merge — k-way merge of sorted CDXJ streams
//!
//! Merges K pre-sorted CDXJ sources into one sorted output stream with a
//! min-heap, reading line by line so memory stays O(K) regardless of input
//! size.
//!
//! ```text
//!  file1.cdxj ──┐
//!  file2.cdxj ──┤   ┌───────────────┐
//!  dir/… .cdxj ─┼──▶│  BinaryHeap   │──▶ sorted output (file or stdout)
//!  stdin (-) ───┘   │ (line, srcid) │
//!                   └───────────────┘
//! ```
//!
//! Ordering is over the raw line bytes (trailing newline stripped), which
//! for well-formed CDXJ is exactly `(surt, timestamp, payload)` order. Equal
//! lines tie-break on the source index, so output is deterministic for any
//! given input set.
//!
//! Each source is validated lazily as it drains: a line comparing strictly
//! below its predecessor aborts the merge with an unsorted-input error, and
//! a line without the two CDXJ separators aborts with a malformed-line
//! error. When the source count exceeds [`MergeOptions::max_open_sources`],
//! sources are first merged in groups into temporary intermediates so the
//! process never holds more than the cap in open descriptors.

mod discover;
mod sources;

pub use discover::{resolve_inputs, MergeInput};

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io::Write;

use anyhow::{bail, Context, Result};
use cdxj::io::LineOutput;
use cdxj::CancelToken;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use sources::Source;

/// Options for a merge run.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Maximum sources merged in one pass; larger fan-ins are staged through
    /// temporary intermediate files.
    pub max_open_sources: usize,
    pub cancel: CancelToken,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            max_open_sources: 512,
            cancel: CancelToken::new(),
        }
    }
}

/// Counters reported after a successful merge.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeStats {
    pub sources: usize,
    pub lines_written: u64,
}

/// One pending line from one source.
///
/// The heap holds at most one entry per source; on pop the entry's source is
/// read again to refill. Ordering is reversed so the `BinaryHeap` max-heap
/// yields the smallest line first, with the lower source index winning ties.
struct HeapEntry {
    line: Vec<u8>,
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.line == other.line && self.source == other.source
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .line
            .cmp(&self.line)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Merges `inputs` into `output` (`-` for stdout).
///
/// # Errors
///
/// Fails on I/O errors, malformed lines, or a sorted-invariant violation in
/// any source. File outputs are written via temp-and-rename, so no partial
/// output is left behind on failure.
pub fn merge(inputs: Vec<MergeInput>, output: &str, opts: &MergeOptions) -> Result<MergeStats> {
    if inputs.is_empty() {
        bail!("no input files to merge");
    }

    let total_sources = inputs.len();
    let started = std::time::Instant::now();
    info!(sources = total_sources, "starting merge");

    // Stage path-backed sources through intermediate merges until the final
    // fan-in fits the descriptor cap. The temp files stay alive in `staged`
    // until the final pass has drained them.
    let mut staged: Vec<NamedTempFile> = Vec::new();
    let mut inputs = inputs;
    while inputs.len() > opts.max_open_sources.max(2) {
        inputs = stage_round(inputs, opts, &mut staged)?;
    }

    let sources = open_sources(inputs)?;
    let mut out = LineOutput::create(output)
        .with_context(|| format!("failed to open output {output}"))?;
    let lines_written = merge_sources(sources, &mut out, &opts.cancel)?;
    out.commit()?;

    info!(
        lines = lines_written,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "merge complete"
    );
    Ok(MergeStats {
        sources: total_sources,
        lines_written,
    })
}

/// Merges one round of groups into temporary intermediates.
fn stage_round(
    inputs: Vec<MergeInput>,
    opts: &MergeOptions,
    staged: &mut Vec<NamedTempFile>,
) -> Result<Vec<MergeInput>> {
    let group_size = opts.max_open_sources.max(2);
    debug!(
        inputs = inputs.len(),
        group_size, "fan-in exceeds cap, staging intermediate merges"
    );

    let mut next_round = Vec::new();
    let mut iter = inputs.into_iter().peekable();
    while iter.peek().is_some() {
        let group: Vec<MergeInput> = iter.by_ref().take(group_size).collect();
        if group.len() == 1 {
            next_round.extend(group);
            continue;
        }

        let tmp = NamedTempFile::new().context("failed to create staging file")?;
        let sources = open_sources(group)?;
        let mut writer = std::io::BufWriter::with_capacity(cdxj::io::BUFFER_SIZE, tmp.reopen()?);
        merge_sources(sources, &mut writer, &opts.cancel)?;
        writer.flush()?;

        next_round.push(MergeInput::Path(tmp.path().to_path_buf()));
        staged.push(tmp);
    }
    Ok(next_round)
}

fn open_sources(inputs: Vec<MergeInput>) -> Result<Vec<Source>> {
    inputs.into_iter().map(Source::open).collect()
}

/// Core heap-driven merge loop over already-open sources.
fn merge_sources(
    mut sources: Vec<Source>,
    out: &mut dyn Write,
    cancel: &CancelToken,
) -> Result<u64> {
    let mut heap = BinaryHeap::with_capacity(sources.len());
    for (idx, source) in sources.iter_mut().enumerate() {
        if let Some(line) = source.next_line()? {
            heap.push(HeapEntry { line, source: idx });
        }
    }

    let mut lines_written = 0u64;
    while let Some(entry) = heap.pop() {
        cancel.check()?;

        out.write_all(&entry.line)?;
        out.write_all(b"\n")?;
        lines_written += 1;

        if let Some(line) = sources[entry.source].next_line()? {
            heap.push(HeapEntry {
                line,
                source: entry.source,
            });
        }
    }

    Ok(lines_written)
}

#[cfg(test)]
mod tests;
