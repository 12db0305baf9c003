//! Input resolution for the merge: expand files and directories into the
//! final source list, applying exclusion glob patterns.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use glob::Pattern;
use tracing::{debug, info, warn};

/// One resolved merge source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeInput {
    Stdin,
    Path(PathBuf),
}

/// Expands `paths` (files, directories, or `-`) into merge sources.
///
/// Directories are walked recursively and contribute their `*.cdxj` files in
/// sorted order. Exclusion patterns are glob-matched against both the
/// basename and the full path; matches are dropped. `-` selects stdin and
/// cannot be combined with directory inputs (stdin can only be read once, so
/// it cannot take part in multi-pass recursion).
///
/// # Errors
///
/// Fails on an invalid exclusion pattern, a nonexistent path, or a
/// stdin/directory combination.
pub fn resolve_inputs(paths: &[String], exclude: &[String]) -> Result<Vec<MergeInput>> {
    let patterns = compile_patterns(exclude)?;

    let mut inputs = Vec::new();
    let mut used_stdin = false;
    let mut saw_dir = false;
    let mut excluded = 0usize;

    for path in paths {
        if path == cdxj::io::STDIO {
            if used_stdin {
                bail!("stdin ('-') may be given only once");
            }
            used_stdin = true;
            inputs.push(MergeInput::Stdin);
            continue;
        }

        let p = Path::new(path);
        if p.is_file() {
            if let Some(pattern) = excluded_by(p, &patterns) {
                debug!(path = %p.display(), pattern, "excluded");
                excluded += 1;
            } else {
                debug!(path = %p.display(), "included");
                inputs.push(MergeInput::Path(p.to_path_buf()));
            }
        } else if p.is_dir() {
            saw_dir = true;
            debug!(dir = %p.display(), "scanning directory");
            walk_dir(p, &patterns, &mut inputs, &mut excluded)?;
        } else {
            bail!("input path not found: {path}");
        }
    }

    if used_stdin && saw_dir {
        bail!("stdin ('-') cannot be combined with directory inputs");
    }

    info!(
        included = inputs.len(),
        excluded, "resolved merge inputs"
    );
    if inputs.is_empty() {
        warn!("no inputs left after applying exclusions");
    }
    Ok(inputs)
}

fn compile_patterns(exclude: &[String]) -> Result<Vec<Pattern>> {
    exclude
        .iter()
        .map(|e| Pattern::new(e).with_context(|| format!("invalid exclude pattern {e:?}")))
        .collect()
}

/// Returns the matching pattern text when `path` should be excluded.
fn excluded_by<'a>(path: &Path, patterns: &'a [Pattern]) -> Option<&'a str> {
    let basename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let full = path.to_string_lossy();
    patterns
        .iter()
        .find(|p| p.matches(basename) || p.matches(&full))
        .map(Pattern::as_str)
}

fn walk_dir(
    dir: &Path,
    patterns: &[Pattern],
    inputs: &mut Vec<MergeInput>,
    excluded: &mut usize,
) -> Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("failed to read directory {}", dir.display()))?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk_dir(&path, patterns, inputs, excluded)?;
        } else if path.extension().is_some_and(|e| e == "cdxj") {
            if let Some(pattern) = excluded_by(&path, patterns) {
                debug!(path = %path.display(), pattern, "excluded");
                *excluded += 1;
            } else {
                debug!(path = %path.display(), "included");
                inputs.push(MergeInput::Path(path));
            }
        }
    }
    Ok(())
}
