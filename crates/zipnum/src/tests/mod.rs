mod index_tests;

use std::path::Path;

use anyhow::Result;

use crate::{encode_stream, EncodeStats, ZipnumWriterOptions};

/// Six sorted sample lines used across the round-trip tests.
pub(crate) const SAMPLE: &str = "\
com,example)/ 20230101000000 {\"status\":\"200\"}
com,example)/a 20230102000000 {\"status\":\"200\"}
com,example)/b 20230103000000 {\"status\":\"404\"}
com,example,www)/ 20230104000000 {\"status\":\"200\"}
org,archive)/ 20230105000000 {\"status\":\"200\"}
org,archive)/about 20230106000000 {\"status\":\"301\"}
";

pub(crate) fn small_chunk_opts(chunk_lines: usize) -> ZipnumWriterOptions {
    ZipnumWriterOptions {
        chunk_lines,
        workers: 2,
        ..ZipnumWriterOptions::default()
    }
}

pub(crate) fn encode_str(
    input: &str,
    dir: &Path,
    opts: &ZipnumWriterOptions,
) -> Result<EncodeStats> {
    encode_stream(&mut input.as_bytes(), "test", dir, opts)
}
