//! ZipNum encoder: sorted CDXJ stream in, shard set out.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use anyhow::{bail, Context, Result};
use cdxj::io::{input_name, open_input, AtomicFile};
use cdxj::{prejson_key, CancelToken, CdxError};
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::pool::{recv, WorkerPool};
use crate::{IdxEntry, SHARD_EXT};

/// Options for a ZipNum encode run. Defaults match the conventional replay
/// configuration: 3000-line chunks, 100 MiB shards, gzip level 6, four
/// compression workers.
#[derive(Debug, Clone)]
pub struct ZipnumWriterOptions {
    pub chunk_lines: usize,
    pub shard_size_bytes: u64,
    pub compression_level: u32,
    pub workers: usize,
    /// Base name for shard/idx/loc files; defaults to the output directory's
    /// basename.
    pub base_name: Option<String>,
    /// Index filename within the output directory (default `<base>.idx`).
    pub idx_name: Option<String>,
    /// Location filename within the output directory (default `<base>.loc`).
    pub loc_name: Option<String>,
    pub cancel: CancelToken,
}

impl Default for ZipnumWriterOptions {
    fn default() -> Self {
        Self {
            chunk_lines: 3000,
            shard_size_bytes: 100 * 1024 * 1024,
            compression_level: 6,
            workers: 4,
            base_name: None,
            idx_name: None,
            loc_name: None,
            cancel: CancelToken::new(),
        }
    }
}

/// Counters reported after a successful encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeStats {
    pub lines: u64,
    pub chunks: u64,
    pub shards: usize,
}

/// Encodes `input` (path, `.gz` path, or `-`) into a shard set under
/// `output_dir`.
pub fn encode(input: &str, output_dir: &Path, opts: &ZipnumWriterOptions) -> Result<EncodeStats> {
    let mut reader = open_input(input)?;
    encode_stream(&mut reader, input_name(input), output_dir, opts)
}

/// [`encode`] over an already-open stream.
pub fn encode_stream(
    reader: &mut dyn BufRead,
    source_name: &str,
    output_dir: &Path,
    opts: &ZipnumWriterOptions,
) -> Result<EncodeStats> {
    if opts.chunk_lines == 0 {
        bail!("chunk_lines must be at least 1");
    }
    if !(1..=9).contains(&opts.compression_level) {
        bail!("compression level must be 1-9, got {}", opts.compression_level);
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;
    let base = base_name(output_dir, opts);

    let mut encoder = Encoder::new(source_name, output_dir, &base, opts)?;
    let result = encoder.run(reader);
    match result {
        Ok(stats) => Ok(stats),
        Err(e) => {
            encoder.discard();
            Err(e)
        }
    }
}

fn base_name(output_dir: &Path, opts: &ZipnumWriterOptions) -> String {
    if let Some(base) = &opts.base_name {
        return base.clone();
    }
    output_dir
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("zipnum")
        .to_string()
}

/// A sealed chunk whose compression result is pending.
struct PendingChunk {
    rx: Receiver<std::io::Result<Vec<u8>>>,
    first_key: String,
}

/// One open shard file being appended to.
struct OpenShard {
    writer: BufWriter<File>,
    tmp_path: PathBuf,
    offset: u64,
}

struct Encoder<'a> {
    source_name: String,
    output_dir: PathBuf,
    base: String,
    opts: &'a ZipnumWriterOptions,
    pool: WorkerPool,
    pending: VecDeque<PendingChunk>,
    shard: Option<OpenShard>,
    /// Temp paths of all shards written so far, in shard order.
    shard_tmp_paths: Vec<PathBuf>,
    entries: Vec<IdxEntry>,
    stats: EncodeStats,
    started: std::time::Instant,
}

impl<'a> Encoder<'a> {
    fn new(
        source_name: &str,
        output_dir: &Path,
        base: &str,
        opts: &'a ZipnumWriterOptions,
    ) -> Result<Self> {
        Ok(Self {
            source_name: source_name.to_string(),
            output_dir: output_dir.to_path_buf(),
            base: base.to_string(),
            opts,
            pool: WorkerPool::new(opts.workers)?,
            pending: VecDeque::new(),
            shard: None,
            shard_tmp_paths: Vec::new(),
            entries: Vec::new(),
            stats: EncodeStats::default(),
            started: std::time::Instant::now(),
        })
    }

    fn run(&mut self, reader: &mut dyn BufRead) -> Result<EncodeStats> {
        let mut chunk_data: Vec<u8> = Vec::new();
        let mut chunk_first_key = String::new();
        let mut chunk_count = 0usize;
        let mut prev_key: Option<String> = None;
        let mut line = String::new();
        let mut line_no = 0u64;

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;

            let key = prejson_key(&line).to_string();
            if let Some(prev) = &prev_key {
                if key.as_str() < prev.as_str() {
                    return Err(CdxError::unsorted(
                        &self.source_name,
                        line_no,
                        prev.as_bytes(),
                        key.as_bytes(),
                    )
                    .into());
                }
            }

            if chunk_count == 0 {
                chunk_first_key = key.clone();
            }
            prev_key = Some(key);

            chunk_data.extend_from_slice(line.as_bytes());
            if !line.ends_with('\n') {
                chunk_data.push(b'\n');
            }
            chunk_count += 1;
            self.stats.lines += 1;

            if chunk_count >= self.opts.chunk_lines {
                self.opts.cancel.check()?;
                self.seal_chunk(std::mem::take(&mut chunk_data), &chunk_first_key)?;
                chunk_count = 0;
            }
        }

        if chunk_count > 0 {
            self.seal_chunk(chunk_data, &chunk_first_key)?;
        }

        // Drain every pending compression, then close the last shard.
        while let Some(pending) = self.pending.pop_front() {
            self.write_chunk(pending)?;
        }
        self.close_shard()?;

        self.finish()
    }

    /// Submits a chunk for compression and opportunistically drains finished
    /// results, blocking only when more than `2 x workers` are in flight.
    fn seal_chunk(&mut self, data: Vec<u8>, first_key: &str) -> Result<()> {
        let level = Compression::new(self.opts.compression_level);
        let rx = self.pool.submit(move || {
            let mut enc = GzEncoder::new(Vec::with_capacity(data.len() / 3), level);
            enc.write_all(&data)?;
            enc.finish()
        });
        self.pending.push_back(PendingChunk {
            rx,
            first_key: first_key.to_string(),
        });

        while self.pending.len() > self.pool.max_in_flight() {
            let front = self.pending.pop_front().expect("pending non-empty");
            self.write_chunk(front)?;
        }
        Ok(())
    }

    /// Appends one compressed chunk to the current shard and records its
    /// index entry, rolling over to a new shard when the size budget is hit.
    fn write_chunk(&mut self, pending: PendingChunk) -> Result<()> {
        self.opts.cancel.check()?;
        let compressed = recv(pending.rx)?.context("chunk compression failed")?;

        if self.shard.is_none() {
            self.open_shard()?;
        }
        let shard_index = (self.shard_tmp_paths.len() - 1) as u32;
        let shard = self.shard.as_mut().expect("shard open");

        let offset = shard.offset;
        shard.writer.write_all(&compressed)?;
        shard.offset += compressed.len() as u64;

        self.entries.push(IdxEntry {
            first_key: pending.first_key,
            // Placeholder; final shard names are assigned in finish() once
            // the total shard count is known. shard_num is 0-based here and
            // rewritten to the on-disk 1-based numbering at the same time.
            shard_name: String::new(),
            offset,
            length: compressed.len() as u64,
            shard_num: shard_index,
        });
        self.stats.chunks += 1;

        if shard.offset >= self.opts.shard_size_bytes {
            self.close_shard()?;
        }
        Ok(())
    }

    fn open_shard(&mut self) -> Result<()> {
        let shard_num = self.shard_tmp_paths.len() + 1;
        let tmp_path = self
            .output_dir
            .join(format!("{}-{:02}{}.tmp", self.base, shard_num, SHARD_EXT));
        debug!(shard = shard_num, path = %tmp_path.display(), "opening shard");

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .with_context(|| format!("failed to create shard {}", tmp_path.display()))?;
        self.shard_tmp_paths.push(tmp_path.clone());
        self.shard = Some(OpenShard {
            writer: BufWriter::with_capacity(cdxj::io::BUFFER_SIZE, file),
            tmp_path,
            offset: 0,
        });
        Ok(())
    }

    fn close_shard(&mut self) -> Result<()> {
        if let Some(mut shard) = self.shard.take() {
            shard.writer.flush()?;
            shard
                .writer
                .get_ref()
                .sync_all()
                .with_context(|| format!("failed to sync shard {}", shard.tmp_path.display()))?;
        }
        Ok(())
    }

    /// Renames shards to their final names and writes the index and location
    /// files. Nothing becomes visible before this point.
    fn finish(&mut self) -> Result<EncodeStats> {
        let shard_count = self.shard_tmp_paths.len();
        let shard_names: Vec<String> = (1..=shard_count)
            .map(|n| {
                if shard_count == 1 {
                    self.base.clone()
                } else {
                    format!("{}-{:02}", self.base, n)
                }
            })
            .collect();

        for (tmp, name) in self.shard_tmp_paths.iter().zip(&shard_names) {
            let final_path = self.output_dir.join(format!("{name}{SHARD_EXT}"));
            fs::rename(tmp, &final_path).with_context(|| {
                format!("failed to rename shard into place at {}", final_path.display())
            })?;
        }

        let idx_path = self
            .output_dir
            .join(self.opts.idx_name.as_deref().unwrap_or(&format!("{}.idx", self.base)));
        let mut idx = AtomicFile::create(&idx_path)?;
        for entry in &mut self.entries {
            entry.shard_name = shard_names[entry.shard_num as usize].clone();
            entry.shard_num += 1;
            writeln!(idx, "{}", entry.format())?;
        }
        idx.commit()?;

        let loc_path = self
            .output_dir
            .join(self.opts.loc_name.as_deref().unwrap_or(&format!("{}.loc", self.base)));
        let mut loc = AtomicFile::create(&loc_path)?;
        for name in &shard_names {
            writeln!(loc, "{name}\t{name}{SHARD_EXT}")?;
        }
        loc.commit()?;

        self.stats.shards = shard_count;
        info!(
            lines = self.stats.lines,
            chunks = self.stats.chunks,
            shards = shard_count,
            idx = %idx_path.display(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "zipnum encode complete"
        );
        Ok(self.stats)
    }

    /// Removes temporary shard files after a failed or cancelled run.
    fn discard(&mut self) {
        self.shard = None;
        for tmp in &self.shard_tmp_paths {
            let _ = fs::remove_file(tmp);
        }
    }
}
