//! File discovery and type detection for search inputs.
//!
//! Callers hand over a mix of files, directories and glob patterns;
//! discovery expands them into a deduplicated, sorted list of index files.
//! Type detection is by extension first, falling back to sniffing the first
//! bytes when the extension says nothing.

use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use glob::Pattern;
use tracing::{debug, warn};

/// What kind of search input a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// A flat sorted CDXJ file.
    Cdxj,
    /// A ZipNum index (`.idx`).
    ZipnumIdx,
    /// A ZipNum shard (`.cdx.gz` / `.cdxj.gz`).
    ZipnumShard,
}

/// Extensions collected when walking directories.
const SEARCHABLE_SUFFIXES: &[&str] = &[".cdxj", ".idx", ".cdxj.gz", ".cdx.gz"];

/// Expands `patterns` (paths, directories or globs) into a sorted,
/// deduplicated file list, minus exclusion matches.
pub fn discover_files(patterns: &[String], exclude: &[String]) -> Result<Vec<PathBuf>> {
    let exclude: Vec<Pattern> = exclude
        .iter()
        .map(|e| Pattern::new(e).with_context(|| format!("invalid exclude pattern {e:?}")))
        .collect::<Result<_>>()?;

    let mut files = BTreeSet::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_dir() {
            debug!(dir = %pattern, "scanning directory");
            let mut visited = BTreeSet::new();
            let mut on_path = BTreeSet::new();
            walk(path, &mut files, &mut visited, &mut on_path)?;
        } else if path.is_file() {
            files.insert(canonical(path));
        } else {
            let mut matched_any = false;
            for entry in glob::glob(pattern)
                .with_context(|| format!("invalid file pattern {pattern:?}"))?
            {
                let entry = entry?;
                if entry.is_file() {
                    files.insert(canonical(&entry));
                    matched_any = true;
                }
            }
            if !matched_any {
                warn!(%pattern, "pattern matched no files");
            }
        }
    }

    let mut result: Vec<PathBuf> = files
        .into_iter()
        .filter(|path| {
            let basename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            let full = path.to_string_lossy();
            !exclude.iter().any(|p| p.matches(basename) || p.matches(&full))
        })
        .collect();
    result.sort();

    debug!(found = result.len(), "discovered search inputs");
    Ok(result)
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Recursive directory walk collecting searchable files.
///
/// Symlinked directories are followed once: a directory already walked
/// elsewhere in the tree is skipped, while a link back to an ancestor of
/// the current descent is a cycle and aborts.
fn walk(
    dir: &Path,
    files: &mut BTreeSet<PathBuf>,
    visited: &mut BTreeSet<PathBuf>,
    on_path: &mut BTreeSet<PathBuf>,
) -> Result<()> {
    let real = canonical(dir);
    if on_path.contains(&real) {
        bail!("symlink cycle detected at {}", dir.display());
    }
    if !visited.insert(real.clone()) {
        return Ok(());
    }
    on_path.insert(real.clone());

    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, files, visited, on_path)?;
        } else if is_searchable(&path) {
            files.insert(canonical(&path));
        }
    }

    on_path.remove(&real);
    Ok(())
}

fn is_searchable(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    SEARCHABLE_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Detects a file's search input type.
///
/// Extensions decide when they can; otherwise the first bytes are sniffed —
/// a gzip magic number means shard, a tab-separated five-field first line
/// means index, anything else is treated as flat CDXJ.
pub fn detect_file_type(path: &Path) -> Result<FileType> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.ends_with(".idx") {
        return Ok(FileType::ZipnumIdx);
    }
    if name.ends_with(".cdx.gz") || name.ends_with(".cdxj.gz") {
        return Ok(FileType::ZipnumShard);
    }
    if name.ends_with(".cdxj") {
        return Ok(FileType::Cdxj);
    }
    sniff_file_type(path)
}

fn sniff_file_type(path: &Path) -> Result<FileType> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut head = [0u8; 512];
    let n = file.read(&mut head)?;
    let head = &head[..n];

    if head.starts_with(&[0x1f, 0x8b]) {
        return Ok(FileType::ZipnumShard);
    }

    // An index line has five tab-separated fields with numeric offsets.
    if let Some(first_line) = head.split(|&b| b == b'\n').next() {
        let line = String::from_utf8_lossy(first_line);
        if zipnum::parse_idx_line(&line).is_some() {
            return Ok(FileType::ZipnumIdx);
        }
    }

    Ok(FileType::Cdxj)
}

/// Finds the data file belonging to an index: same stem with a shard
/// extension next to it.
pub fn find_companion_data(idx_path: &Path) -> Result<PathBuf> {
    for ext in ["cdx.gz", "cdxj.gz"] {
        let candidate = idx_path.with_extension(ext);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    bail!("no shard file found for index {}", idx_path.display());
}

/// Finds the index belonging to a shard: same stem with `.idx` next to it.
pub fn find_companion_index(data_path: &Path) -> Result<PathBuf> {
    let name = data_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(".cdx.gz")
        .or_else(|| name.strip_suffix(".cdxj.gz"))
        .unwrap_or(name);
    let candidate = data_path.with_file_name(format!("{stem}.idx"));
    if candidate.is_file() {
        return Ok(candidate);
    }

    // Multi-shard sets: `arch-01.cdx.gz` belongs to `arch.idx`.
    if let Some((base, _)) = stem.rsplit_once('-') {
        let candidate = data_path.with_file_name(format!("{base}.idx"));
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    bail!("no index file found for shard {}", data_path.display());
}
