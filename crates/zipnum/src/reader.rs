//! ZipNum decoder: shard set in, sorted flat CDXJ stream out.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use anyhow::{bail, Context, Result};
use cdxj::io::{LineOutput, STDIO};
use cdxj::CancelToken;
use flate2::read::GzDecoder;
use tracing::{info, warn};

use crate::pool::{recv, WorkerPool};
use crate::{read_index, resolve_shard_path, IdxEntry, LocMap, ZipnumError};

/// Options for a ZipNum decode run.
#[derive(Debug, Clone, Default)]
pub struct ZipnumReaderOptions {
    /// Decompression workers (0 is treated as 1). Default 4 via
    /// [`ZipnumReaderOptions::new`].
    pub workers: usize,
    /// Explicit `.loc` file; by default one is looked up next to the index.
    pub loc_file: Option<PathBuf>,
    /// Directory shards resolve against; defaults to the index's directory.
    pub base_dir: Option<PathBuf>,
    /// Skip missing or corrupt chunks with a warning instead of failing.
    pub skip_errors: bool,
    pub cancel: CancelToken,
}

impl ZipnumReaderOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            workers: 4,
            ..Self::default()
        }
    }
}

/// Counters reported after a decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeStats {
    pub chunks: u64,
    pub chunks_skipped: u64,
    pub bytes_written: u64,
}

/// Decodes the shard set described by `idx_path` (`-` for an index on
/// stdin) into `output` (`-` for stdout).
pub fn decode(idx_path: &str, output: &str, opts: &ZipnumReaderOptions) -> Result<DecodeStats> {
    let mut out = LineOutput::create(output)?;
    let stats = decode_to_writer(idx_path, &mut out, opts)?;
    out.commit()?;
    Ok(stats)
}

/// [`decode`] into any writer.
pub fn decode_to_writer(
    idx_path: &str,
    out: &mut dyn Write,
    opts: &ZipnumReaderOptions,
) -> Result<DecodeStats> {
    let started = std::time::Instant::now();
    let entries = read_index(idx_path)?;
    if entries.is_empty() {
        warn!(idx = idx_path, "index has no entries");
        return Ok(DecodeStats::default());
    }

    let base_dir = match &opts.base_dir {
        Some(dir) => dir.clone(),
        None if idx_path == STDIO => PathBuf::from("."),
        None => Path::new(idx_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let loc = load_loc(idx_path, opts)?;

    let pool = WorkerPool::new(opts.workers)?;
    let mut pending: VecDeque<(Receiver<Result<Vec<u8>>>, IdxEntry)> = VecDeque::new();
    let mut stats = DecodeStats::default();

    for entry in entries {
        opts.cancel.check()?;

        let shard_path = resolve_shard_path(&entry.shard_name, &base_dir, loc.as_ref());
        if !shard_path.is_file() {
            let err = ZipnumError::ShardMissing {
                shard: entry.shard_name.clone(),
                path: shard_path,
            };
            if opts.skip_errors {
                warn!(error = %err, "skipping chunk");
                stats.chunks_skipped += 1;
                continue;
            }
            return Err(err.into());
        }

        let job_entry = entry.clone();
        let rx = pool.submit(move || fetch_chunk(&shard_path, &job_entry));
        pending.push_back((rx, entry));

        while pending.len() > pool.max_in_flight() {
            let front = pending.pop_front().expect("pending non-empty");
            emit(front, out, opts, &mut stats)?;
        }
    }

    while let Some(front) = pending.pop_front() {
        opts.cancel.check()?;
        emit(front, out, opts, &mut stats)?;
    }

    info!(
        chunks = stats.chunks,
        skipped = stats.chunks_skipped,
        bytes = stats.bytes_written,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "zipnum decode complete"
    );
    Ok(stats)
}

fn load_loc(idx_path: &str, opts: &ZipnumReaderOptions) -> Result<Option<LocMap>> {
    if let Some(loc_path) = &opts.loc_file {
        if !loc_path.is_file() {
            bail!("loc file not found: {}", loc_path.display());
        }
        return Ok(Some(LocMap::load(loc_path)?));
    }
    if idx_path == STDIO {
        return Ok(None);
    }
    match LocMap::find_for_index(Path::new(idx_path)) {
        Some(found) => Ok(Some(LocMap::load(&found)?)),
        None => Ok(None),
    }
}

/// Reads and decompresses one chunk's byte range. Runs on the worker pool.
fn fetch_chunk(shard_path: &Path, entry: &IdxEntry) -> Result<Vec<u8>> {
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

    let mut data = Vec::with_capacity(compressed.len() * 3);
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut data)
        .map_err(|e| corrupt(format!("gzip member did not decompress: {e}")))?;
    Ok(data)
}

fn emit(
    (rx, entry): (Receiver<Result<Vec<u8>>>, IdxEntry),
    out: &mut dyn Write,
    opts: &ZipnumReaderOptions,
    stats: &mut DecodeStats,
) -> Result<()> {
    match recv(rx)? {
        Ok(data) => {
            out.write_all(&data)?;
            stats.chunks += 1;
            stats.bytes_written += data.len() as u64;
            Ok(())
        }
        Err(e) if opts.skip_errors => {
            warn!(shard = %entry.shard_name, offset = entry.offset, error = %e, "skipping chunk");
            stats.chunks_skipped += 1;
            Ok(())
        }
        Err(e) => Err(e),
    }
}
