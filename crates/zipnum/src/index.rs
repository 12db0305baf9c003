//! Index (`.idx`) and location (`.loc`) file model.
//!
//! Both are UTF-8 TSV, one entry per line. Parsing is lenient — blank
//! lines, `#` comments and short lines are skipped — because these files
//! are hand-editable and sometimes hand-repaired.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cdxj::io::open_input;

use crate::SHARD_EXT;

/// One chunk entry in a ZipNum index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdxEntry {
    /// Pre-JSON key (`<surt> <timestamp>`) of the chunk's first line.
    pub first_key: String,
    /// Shard name without the `.cdx.gz` extension.
    pub shard_name: String,
    /// Byte offset of the gzip member within the shard file.
    pub offset: u64,
    /// Compressed byte length of the gzip member.
    pub length: u64,
    /// 1-based shard number.
    pub shard_num: u32,
}

impl IdxEntry {
    /// Serializes the entry as an index line (no trailing newline).
    #[must_use]
    pub fn format(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.first_key, self.shard_name, self.offset, self.length, self.shard_num
        )
    }
}

/// Parses one index line; returns `None` for blanks, comments and lines
/// without the five tab-separated fields.
#[must_use]
pub fn parse_idx_line(line: &str) -> Option<IdxEntry> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut parts = line.split('\t');
    let first_key = parts.next()?;
    let shard_name = parts.next()?;
    let offset = parts.next()?.parse().ok()?;
    let length = parts.next()?.parse().ok()?;
    let shard_num = parts.next()?.parse().ok()?;
    Some(IdxEntry {
        first_key: first_key.to_string(),
        shard_name: shard_name.to_string(),
        offset,
        length,
        shard_num,
    })
}

/// Reads all entries of an index file (`-` for stdin), in file order.
pub fn read_index(path: &str) -> Result<Vec<IdxEntry>> {
    use std::io::BufRead;

    let reader = open_input(path)?;
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("failed to read index {path}"))?;
        if let Some(entry) = parse_idx_line(&line) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Shard-name to path map loaded from a `.loc` file.
#[derive(Debug, Default)]
pub struct LocMap {
    map: HashMap<String, String>,
}

impl LocMap {
    pub fn load(path: &Path) -> Result<Self> {
        use std::io::BufRead;

        let display = path.display().to_string();
        let reader = open_input(&display)?;
        let mut map = HashMap::new();
        for line in reader.lines() {
            let line = line.with_context(|| format!("failed to read loc file {display}"))?;
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, location)) = line.split_once('\t') else {
                continue;
            };
            map.insert(name.to_string(), location.to_string());
        }
        Ok(Self { map })
    }

    /// Looks for `<idx stem>.loc` next to an index file.
    pub fn find_for_index(idx_path: &Path) -> Option<PathBuf> {
        let loc = idx_path.with_extension("loc");
        loc.is_file().then_some(loc)
    }

    #[must_use]
    pub fn get(&self, shard_name: &str) -> Option<&str> {
        self.map.get(shard_name).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Resolves a shard name to a filesystem path.
///
/// A `.loc` entry wins (relative entries resolve against `base_dir`);
/// otherwise the shard is expected at `<base_dir>/<shard_name>.cdx.gz`.
#[must_use]
pub fn resolve_shard_path(shard_name: &str, base_dir: &Path, loc: Option<&LocMap>) -> PathBuf {
    if let Some(location) = loc.and_then(|l| l.get(shard_name)) {
        let candidate = Path::new(location);
        if candidate.is_absolute() {
            return candidate.to_path_buf();
        }
        return base_dir.join(candidate);
    }
    base_dir.join(format!("{shard_name}{SHARD_EXT}"))
}
