
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

/// Writes a sorted CDXJ file and returns its path.
pub(crate) fn write_cdxj(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

/// Encodes `lines` into a ZipNum shard set and returns the index path.
pub(crate) fn write_zipnum(dir: &Path, lines: &[&str], chunk_lines: usize) -> Result<PathBuf> {
    let opts = zipnum::ZipnumWriterOptions {
        chunk_lines,
        base_name: Some("arch".to_string()),
        workers: 2,
        ..zipnum::ZipnumWriterOptions::default()
    };
    let input = lines.join("\n") + "\n";
    zipnum::encode_stream(&mut input.as_bytes(), "test", dir, &opts)?;
    Ok(dir.join("arch.idx"))
}

/// Capture lines shared by the match-type scenarios.
pub(crate) const HOST_SAMPLE: &[&str] = &[
    "com,example)/ 20230101000000 {\"s\":200}",
    "com,example)/a 20230101000000 {\"s\":200}",
    "com,example,www)/ 20230101000000 {\"s\":200}",
    "com,other)/ 20230101000000 {\"s\":200}",
];
