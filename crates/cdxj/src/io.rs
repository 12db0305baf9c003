//! Buffered line I/O with stdio and atomic-output support.
//!
//! Every tool in the workspace accepts `-` for the standard streams. File
//! outputs are never written in place: bytes go to a `.tmp` sibling which is
//! flushed, fsynced and renamed over the final path on commit. A writer
//! dropped without commit removes its temporary, so a failed or cancelled
//! operation leaves no partial artifact behind.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;

/// Path spelling that selects the standard streams.
pub const STDIO: &str = "-";

/// Default buffer size for streaming reads and writes (1 MiB).
pub const BUFFER_SIZE: usize = 1024 * 1024;

/// Opens an input for buffered line reading.
///
/// `-` reads the standard input; paths ending in `.gz` are decompressed
/// transparently (concatenated gzip members included, so ZipNum shards can
/// be piped straight back through the tools).
pub fn open_input(path: &str) -> Result<Box<dyn BufRead>> {
    if path == STDIO {
        return Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("failed to open input {path}"))?;
    if path.ends_with(".gz") {
        let gz = MultiGzDecoder::new(BufReader::with_capacity(BUFFER_SIZE, file));
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, gz)))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, file)))
    }
}

/// Returns a display name for an input path (`<stdin>` for `-`).
#[must_use]
pub fn input_name(path: &str) -> &str {
    if path == STDIO {
        "<stdin>"
    } else {
        path
    }
}

/// A line-oriented output that is either the standard output or an atomic
/// file writer. Call [`commit`](LineOutput::commit) after the last write;
/// dropping a file-backed output without committing discards the temp file.
pub enum LineOutput {
    Stdout(BufWriter<io::Stdout>),
    File(AtomicFile),
}

impl LineOutput {
    /// Opens `path` for writing, treating `-` as stdout.
    pub fn create(path: &str) -> Result<Self> {
        if path == STDIO {
            Ok(LineOutput::Stdout(BufWriter::with_capacity(
                BUFFER_SIZE,
                io::stdout(),
            )))
        } else {
            Ok(LineOutput::File(AtomicFile::create(Path::new(path))?))
        }
    }

    /// Flushes, and for file outputs renames the temporary into place.
    pub fn commit(self) -> Result<()> {
        match self {
            LineOutput::Stdout(mut w) => {
                w.flush().context("failed to flush stdout")?;
                Ok(())
            }
            LineOutput::File(f) => f.commit(),
        }
    }
}

impl Write for LineOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LineOutput::Stdout(w) => w.write(buf),
            LineOutput::File(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LineOutput::Stdout(w) => w.flush(),
            LineOutput::File(f) => f.flush(),
        }
    }
}

/// Atomic file writer: writes to `<path>.tmp`, renames to `<path>` on
/// commit, removes the temporary when dropped uncommitted.
pub struct AtomicFile {
    tmp_path: PathBuf,
    final_path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl AtomicFile {
    /// Creates the temporary sibling of `path` for buffered writing.
    pub fn create(path: &Path) -> Result<Self> {
        let tmp_path = tmp_sibling(path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        Ok(Self {
            tmp_path,
            final_path: path.to_path_buf(),
            writer: Some(BufWriter::with_capacity(BUFFER_SIZE, file)),
        })
    }

    /// The path the file will occupy after [`commit`](Self::commit).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.final_path
    }

    /// Flushes, fsyncs and renames the temporary over the final path.
    pub fn commit(mut self) -> Result<()> {
        let writer = self.writer.take().expect("writer present until commit");
        let file = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("failed to flush {}: {}", self.tmp_path.display(), e))?;
        file.sync_all()
            .with_context(|| format!("failed to sync {}", self.tmp_path.display()))?;
        fs::rename(&self.tmp_path, &self.final_path).with_context(|| {
            format!(
                "failed to rename {} to {}",
                self.tmp_path.display(),
                self.final_path.display()
            )
        })?;
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer
            .as_mut()
            .expect("writer present until commit")
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer
            .as_mut()
            .expect("writer present until commit")
            .flush()
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            // Uncommitted: discard the partial temporary.
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// Appends `.tmp` to the file name (`out.cdxj` becomes `out.cdxj.tmp`).
fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
