//! # ZipNum — compressed, binary-searchable CDXJ shard sets
//!
//! Converts a sorted flat CDXJ stream into the ZipNum format served by web
//! archive replay systems, and back. A shard set is three kinds of artifact:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ SHARDS (<base>.cdx.gz, or <base>-01.cdx.gz ... when multiple)    │
//! │                                                                  │
//! │  [gzip member: chunk 0][gzip member: chunk 1][...]               │
//! │                                                                  │
//! │  Each member decompresses to a whole number of CDXJ lines.       │
//! │  Concatenating all members in order reproduces the flat input.   │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ INDEX (<base>.idx) — one line per chunk, tab-separated:          │
//! │                                                                  │
//! │  <first_key>\t<shard_name>\t<offset>\t<length>\t<shard_num>      │
//! │                                                                  │
//! │  first_key is the pre-JSON "<surt> <timestamp>" of the chunk's   │
//! │  first line; offset/length locate the gzip member in its shard.  │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ LOCATION (<base>.loc) — <shard_name>\t<path_or_url> per line     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Chunks default to 3000 lines; shards are closed when their compressed
//! size reaches the budget (default 100 MiB). Compression and decompression
//! run on a bounded worker pool while a single writer keeps chunk order.
//!
//! All artifacts are written to temporary paths and renamed on success; the
//! index and location files only become visible after every shard is
//! durable, so readers never observe a partial shard set.

mod index;
mod pool;
mod reader;
mod writer;

pub use index::{parse_idx_line, read_index, resolve_shard_path, IdxEntry, LocMap};
pub use reader::{decode, decode_to_writer, DecodeStats, ZipnumReaderOptions};
pub use writer::{encode, encode_stream, EncodeStats, ZipnumWriterOptions};

use std::path::PathBuf;

use thiserror::Error;

/// Shard extension shared by writer, reader and file discovery.
pub const SHARD_EXT: &str = ".cdx.gz";

/// Errors specific to reading a shard set.
#[derive(Debug, Error)]
pub enum ZipnumError {
    /// The index references a shard that is not on disk.
    #[error("shard missing: {shard} (expected at {})", path.display())]
    ShardMissing { shard: String, path: PathBuf },

    /// A referenced byte range could not be read or decompressed.
    #[error("shard corrupt: {shard} at offset {offset}: {reason}")]
    ShardCorrupt {
        shard: String,
        offset: u64,
        reason: String,
    },
}

#[cfg(test)]
mod tests;
