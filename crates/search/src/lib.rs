//! # Search — binary search over CDXJ and ZipNum indexes
//!
//! Answers "which captures exist for this URL?" against flat sorted CDXJ
//! files and ZipNum shard sets, without scanning whole files:
//!
//! ```text
//!             ┌─ flat .cdxj ──▶ byte-offset bisection ──┐
//!  query ──▶──┤                                         ├──▶ post-filters ──▶ lines
//!             └─ .idx + shards ─▶ index bisection,      │    (from/to, field
//!                                chunk decompress+scan ─┘     predicates, sort,
//!                                                             dedupe, limit)
//! ```
//!
//! The query key is a SURT, either given directly or derived from a URL.
//! Match types widen the key: `exact` hits one path, `prefix` a path
//! subtree, `host` every capture of a host, `domain` a registered domain
//! and its subdomains. See [`surt`] for the expansion rules.

pub mod discovery;
pub mod filters;
pub mod flat;
pub mod surt;
pub mod zipnum_search;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cdxj::CancelToken;
use tracing::{debug, warn};

use discovery::FileType;
use filters::LineFilter;
pub use surt::MatchType;

/// Options for a search run over one or more files.
pub struct SearchOptions {
    pub match_type: MatchType,
    pub from_ts: Option<String>,
    pub to_ts: Option<String>,
    /// Field predicate expressions (`status=200`, `mime~text/.*`, ...).
    pub filter_exprs: Vec<String>,
    pub limit: Option<usize>,
    pub sort: bool,
    pub dedupe: bool,
    /// Skip unreadable files/chunks with a warning instead of failing.
    pub skip_errors: bool,
    pub cancel: CancelToken,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            match_type: MatchType::Exact,
            from_ts: None,
            to_ts: None,
            filter_exprs: Vec::new(),
            limit: None,
            sort: false,
            dedupe: false,
            skip_errors: false,
            cancel: CancelToken::new(),
        }
    }
}

/// Searches `files` for `search_key` (a SURT), applying match-type
/// expansion and the post-filter pipeline.
///
/// Results preserve per-file on-disk order; `sort`/`dedupe`/`limit` apply
/// to the accumulated set, in that order.
pub fn search_files(
    files: &[PathBuf],
    search_key: &str,
    opts: &SearchOptions,
) -> Result<Vec<String>> {
    let (key, prefix) = surt::expand_match_type(search_key, opts.match_type);
    debug!(%key, prefix, "expanded search key");

    let line_filter = LineFilter::new(
        opts.from_ts.as_deref(),
        opts.to_ts.as_deref(),
        &opts.filter_exprs,
    )?;

    let mut results = Vec::new();
    for file in files {
        opts.cancel.check()?;

        match search_one(file, &key, prefix, opts) {
            Ok(lines) => results.extend(lines),
            Err(e) if opts.skip_errors => {
                warn!(file = %file.display(), error = %e, "skipping file");
            }
            Err(e) => return Err(e),
        }
    }

    if !line_filter.is_empty() {
        results.retain(|line| line_filter.matches(line));
    }
    if opts.sort {
        filters::sort_lines(&mut results);
    }
    if opts.dedupe {
        filters::dedupe_consecutive(&mut results);
    }
    if let Some(limit) = opts.limit {
        results.truncate(limit);
    }
    Ok(results)
}

/// Searches one file, dispatching on its detected type.
fn search_one(
    path: &Path,
    key: &str,
    prefix: bool,
    opts: &SearchOptions,
) -> Result<Vec<String>> {
    match discovery::detect_file_type(path)? {
        FileType::Cdxj => flat::search_flat_file(path, key, prefix, &opts.cancel),
        FileType::ZipnumIdx => {
            zipnum_search::search_zipnum(path, key, prefix, opts.skip_errors, &opts.cancel)
        }
        FileType::ZipnumShard => {
            // Searching a shard goes through its companion index.
            let idx = discovery::find_companion_index(path).with_context(|| {
                format!("no index found for shard {}", path.display())
            })?;
            zipnum_search::search_zipnum(&idx, key, prefix, opts.skip_errors, &opts.cancel)
        }
    }
}

#[cfg(test)]
mod tests;
