//! Binary search over a ZipNum shard set via its index.
//!
//! The index is small (one line per 3000-record chunk), so it is loaded
//! whole and bisected in memory. Only candidate chunks — those whose key
//! range can intersect the query — are fetched and decompressed, then
//! scanned with the same match rules as the flat search.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};
use cdxj::{surt_key_of, CancelToken};
use flate2::read::GzDecoder;
use tracing::{debug, warn};
use zipnum::{read_index, resolve_shard_path, IdxEntry, LocMap, ZipnumError};

/// Searches the shard set described by `idx_path` for `key`.
pub fn search_zipnum(
    idx_path: &Path,
    key: &str,
    prefix: bool,
    skip_errors: bool,
    cancel: &CancelToken,
) -> Result<Vec<String>> {
    let idx_display = idx_path.display().to_string();
    let entries = read_index(&idx_display)?;
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let base_dir = idx_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let loc = match LocMap::find_for_index(idx_path) {
        Some(loc_path) => Some(LocMap::load(&loc_path)?),
        None => None,
    };

    // Last chunk whose first SURT sorts below the key may still contain it;
    // start there and walk forward while chunks can intersect the query.
    let start = entries
        .partition_point(|e| first_surt(e) < key)
        .saturating_sub(1);

    let mut results = Vec::new();
    for entry in &entries[start..] {
        cancel.check()?;

        if !chunk_may_match(entry, key, prefix) {
            break;
        }

        let shard_path = resolve_shard_path(&entry.shard_name, base_dir, loc.as_ref());
        match scan_chunk(&shard_path, entry, key, prefix) {
            Ok(lines) => {
                debug!(
                    shard = %entry.shard_name,
                    offset = entry.offset,
                    matches = lines.len(),
                    "scanned chunk"
                );
                results.extend(lines);
            }
            Err(e) if skip_errors => {
                warn!(shard = %entry.shard_name, offset = entry.offset, error = %e, "skipping chunk");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(results)
}

/// The SURT portion of an index entry's first key (`<surt> <timestamp>`).
fn first_surt(entry: &IdxEntry) -> &str {
    entry
        .first_key
        .split_once(' ')
        .map_or(entry.first_key.as_str(), |(surt, _)| surt)
}

/// Whether a chunk's key range can still contain matches for `key`.
///
/// A chunk starting at or below the key can always contain it; once chunk
/// keys pass the query, only prefix queries whose prefix still covers the
/// chunk's first key keep matching.
fn chunk_may_match(entry: &IdxEntry, key: &str, prefix: bool) -> bool {
    let surt = first_surt(entry);
    if surt <= key {
        return true;
    }
    prefix && surt.starts_with(key)
}

/// Fetches, decompresses and scans one chunk.
fn scan_chunk(
    shard_path: &Path,
    entry: &IdxEntry,
    key: &str,
    prefix: bool,
) -> Result<Vec<String>> {
    if !shard_path.is_file() {
        return Err(ZipnumError::ShardMissing {
            shard: entry.shard_name.clone(),
            path: shard_path.to_path_buf(),
        }
        .into());
    }

    let corrupt = |reason: String| ZipnumError::ShardCorrupt {
        shard: entry.shard_name.clone(),
        offset: entry.offset,
        reason,
    };

    let mut file = File::open(shard_path)
        .with_context(|| format!("failed to open shard {}", shard_path.display()))?;
    file.seek(SeekFrom::Start(entry.offset))
        .map_err(|e| corrupt(format!("seek failed: {e}")))?;
    let mut compressed = vec![0u8; entry.length as usize];
    file.read_exact(&mut compressed)
        .map_err(|e| corrupt(format!("short read: {e}")))?;

    let mut chunk = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut chunk)
        .map_err(|e| corrupt(format!("gzip member did not decompress: {e}")))?;

    let mut results = Vec::new();
    for line in chunk.lines() {
        if line.is_empty() {
            continue;
        }
        let line_key = surt_key_of(line);
        let is_match = if prefix {
            line_key.starts_with(key)
        } else {
            line_key == key
        };
        if is_match {
            results.push(line.to_string());
        } else if line_key > key {
            break;
        }
    }
    Ok(results)
}
