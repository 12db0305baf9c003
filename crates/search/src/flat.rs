//! Byte-offset binary search over a sorted flat CDXJ file.
//!
//! The file is bisected by byte offset: each probe seeks to the midpoint,
//! skips forward to the next line boundary, and compares that line's SURT
//! with the search key. Probes only ever move the left bound past whole
//! lines that sort below the key, so when the window collapses the left
//! bound sits on a line boundary at or before the first match, and a short
//! forward scan emits the matching run.
//!
//! Cost is O(log N) probes plus the emitted lines, with each probe reading
//! one buffered line.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};
use cdxj::{surt_key_of, CancelToken, CdxError};

/// Searches a sorted flat CDXJ file for `key`.
///
/// With `prefix` false, returns exactly the lines whose SURT equals `key`;
/// with `prefix` true, the lines whose SURT starts with `key`. Lines come
/// back in file order, newline stripped.
pub fn search_flat_file(
    path: &Path,
    key: &str,
    prefix: bool,
    cancel: &CancelToken,
) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let size = file.metadata()?.len();
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    search_reader(
        &mut reader,
        size,
        key,
        prefix,
        &path.display().to_string(),
        cancel,
    )
}

/// [`search_flat_file`] over any seekable reader of `size` bytes.
pub fn search_reader<R: BufRead + Seek>(
    reader: &mut R,
    size: u64,
    key: &str,
    prefix: bool,
    source_name: &str,
    cancel: &CancelToken,
) -> Result<Vec<String>> {
    if size == 0 {
        return Ok(Vec::new());
    }

    let start = bisect(reader, size, key, cancel)?;
    collect_matches(reader, size, start, key, prefix, source_name, cancel)
}

/// Narrows `[0, size)` down to a line-boundary offset at or before the
/// first line whose SURT is `>= key`.
fn bisect<R: BufRead + Seek>(
    reader: &mut R,
    size: u64,
    key: &str,
    cancel: &CancelToken,
) -> Result<u64> {
    let mut left = 0u64;
    let mut right = size;
    let mut buf = Vec::new();

    while left < right {
        cancel.check()?;

        let mid = left + (right - left) / 2;
        reader.seek(SeekFrom::Start(mid))?;

        // Unless at the very start, the midpoint lands inside a line; skip
        // the partial line to reach a boundary.
        if mid > 0 {
            buf.clear();
            reader.read_until(b'\n', &mut buf)?;
        }
        let line_start = reader.stream_position()?;
        if line_start >= size {
            right = mid;
            continue;
        }

        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            right = mid;
            continue;
        }
        let line_end = line_start + n as u64;

        let line = String::from_utf8_lossy(&buf);
        let line_key = surt_key_of(&line);

        if line_key < key {
            // The whole line sorts below the key; move past it.
            left = line_end;
        } else {
            right = mid;
        }
    }

    Ok(left)
}

/// Scans forward from `start` (a line boundary) and collects the matching
/// run. Detects sort-order inversions while it scans.
fn collect_matches<R: BufRead + Seek>(
    reader: &mut R,
    size: u64,
    start: u64,
    key: &str,
    prefix: bool,
    source_name: &str,
    cancel: &CancelToken,
) -> Result<Vec<String>> {
    reader.seek(SeekFrom::Start(start))?;

    let mut results = Vec::new();
    let mut buf = Vec::new();
    let mut pos = start;
    let mut line_no = 0u64;
    let mut prev_key: Option<String> = None;

    while pos < size {
        cancel.check()?;

        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        pos += n as u64;
        line_no += 1;

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            continue;
        }
        let line_key = surt_key_of(line);

        if let Some(prev) = &prev_key {
            if line_key < prev.as_str() {
                return Err(CdxError::unsorted(
                    source_name,
                    line_no,
                    prev.as_bytes(),
                    line_key.as_bytes(),
                )
                .into());
            }
        }
        prev_key = Some(line_key.to_string());

        let is_match = if prefix {
            line_key.starts_with(key)
        } else {
            line_key == key
        };

        if is_match {
            results.push(line.to_string());
        } else if line_key > key {
            // Sorted input: nothing further can match.
            break;
        }
        // line_key < key: still approaching the match region.
    }

    Ok(results)
}
