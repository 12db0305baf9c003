//! Excessive-URL filter: suppress SURT keys with runaway capture counts.
//!
//! `find` scans once and reports every key whose count exceeds the
//! threshold; `remove` drops lines whose key is in a preloaded set; `auto`
//! chains the two over the same file (so it cannot run on stdin). The
//! cardinality table lives only for the duration of one pass.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use cdxj::io::{open_input, LineOutput, STDIO};
use cdxj::{surt_key_of, CancelToken};
use tracing::info;

use crate::FilterStats;

/// Default occurrence threshold above which a key is excessive.
pub const DEFAULT_THRESHOLD: u64 = 1000;

/// Scans `input` and returns `(surt, count)` for every key whose count
/// exceeds `threshold`, ordered by descending count (ties by key).
pub fn find(input: &str, threshold: u64, cancel: &CancelToken) -> Result<Vec<(String, u64)>> {
    let mut reader = open_input(input)?;
    find_stream(&mut reader, threshold, cancel)
}

/// [`find`] over an already-open stream.
pub fn find_stream(
    reader: &mut dyn BufRead,
    threshold: u64,
    cancel: &CancelToken,
) -> Result<Vec<(String, u64)>> {
    let mut counts: HashMap<String, u64> = HashMap::new();

    let mut line = String::new();
    loop {
        cancel.check()?;

        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let surt = surt_key_of(&line);
        if surt.is_empty() {
            continue;
        }
        *counts.entry(surt.to_string()).or_insert(0) += 1;
    }

    let mut excessive: Vec<(String, u64)> = counts
        .into_iter()
        .filter(|&(_, count)| count > threshold)
        .collect();
    excessive.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    info!(
        excessive = excessive.len(),
        threshold, "excessive-url scan complete"
    );
    Ok(excessive)
}

/// Writes a find report: one `<surt>\t<count>` line per key, then a summary
/// comment line.
pub fn write_report(
    out: &mut dyn Write,
    excessive: &[(String, u64)],
    threshold: u64,
) -> Result<()> {
    for (surt, count) in excessive {
        writeln!(out, "{surt}\t{count}")?;
    }
    writeln!(
        out,
        "# Found {} URLs with > {} occurrences",
        excessive.len(),
        threshold
    )?;
    Ok(())
}

/// Loads a key set from a find report (or any file whose first
/// whitespace-separated field per line is the SURT). Comments and blank
/// lines are ignored.
pub fn load_key_set(path: &str) -> Result<HashSet<String>> {
    let reader = open_input(path)?;
    let mut keys = HashSet::new();

    for line in reader.lines() {
        let line = line.with_context(|| format!("failed to read key list {path}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(key) = trimmed.split_whitespace().next() {
            keys.insert(key.to_string());
        }
    }
    Ok(keys)
}

/// Streams `input` to `output`, dropping lines whose SURT is in `keys`.
pub fn remove(
    input: &str,
    keys: &HashSet<String>,
    output: &str,
    cancel: &CancelToken,
) -> Result<FilterStats> {
    let mut reader = open_input(input)?;
    let mut out = LineOutput::create(output)?;
    let stats = remove_stream(&mut reader, keys, &mut out, cancel)?;
    out.commit()?;

    info!(
        kept = stats.kept,
        dropped = stats.dropped,
        "excessive-url removal complete"
    );
    Ok(stats)
}

/// [`remove`] over already-open streams.
pub fn remove_stream(
    reader: &mut dyn BufRead,
    keys: &HashSet<String>,
    out: &mut dyn Write,
    cancel: &CancelToken,
) -> Result<FilterStats> {
    let mut stats = FilterStats::default();
    let mut line = String::new();

    loop {
        cancel.check()?;

        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        if keys.contains(surt_key_of(&line)) {
            stats.dropped += 1;
        } else {
            let stripped = line.trim_end_matches(['\n', '\r']);
            out.write_all(stripped.as_bytes())?;
            out.write_all(b"\n")?;
            stats.kept += 1;
        }
    }

    Ok(stats)
}

/// Find-then-remove over the same file. Two passes are required, so stdin
/// is rejected.
///
/// Returns the number of excessive keys found together with the removal
/// counters.
pub fn auto(
    input: &str,
    output: &str,
    threshold: u64,
    cancel: &CancelToken,
) -> Result<(usize, FilterStats)> {
    if input == STDIO {
        bail!("auto mode reads its input twice and cannot run on stdin; use find + remove");
    }

    let excessive = find(input, threshold, cancel)?;
    let keys: HashSet<String> = excessive.into_iter().map(|(surt, _)| surt).collect();
    let stats = remove(input, &keys, output, cancel)?;
    Ok((keys.len(), stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const TRAP: &str = "pt,trap)/loop 20230101000000 {}\n";
    const OK: &str = "pt,ok)/ 20230101000000 {}\n";

    fn sample_input() -> String {
        format!("{}{}", TRAP.repeat(5), OK)
    }

    #[test]
    fn find_reports_keys_over_threshold() {
        let input = sample_input();
        let excessive =
            find_stream(&mut input.as_bytes(), 2, &CancelToken::new()).unwrap();
        assert_eq!(excessive, vec![("pt,trap)/loop".to_string(), 5)]);
    }

    #[test]
    fn find_report_format() {
        let input = sample_input();
        let excessive =
            find_stream(&mut input.as_bytes(), 2, &CancelToken::new()).unwrap();

        let mut out = Vec::new();
        write_report(&mut out, &excessive, 2).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "pt,trap)/loop\t5\n# Found 1 URLs with > 2 occurrences\n"
        );
    }

    #[test]
    fn find_orders_by_descending_count() {
        let input = format!(
            "{}{}{}",
            "pt,a)/ 20230101000000 {}\n".repeat(3),
            "pt,b)/ 20230101000000 {}\n".repeat(5),
            "pt,c)/ 20230101000000 {}\n".repeat(3),
        );
        let excessive =
            find_stream(&mut input.as_bytes(), 2, &CancelToken::new()).unwrap();
        assert_eq!(
            excessive,
            vec![
                ("pt,b)/".to_string(), 5),
                ("pt,a)/".to_string(), 3),
                ("pt,c)/".to_string(), 3),
            ]
        );
    }

    #[test]
    fn count_at_threshold_is_not_excessive() {
        let input = TRAP.repeat(2);
        let excessive =
            find_stream(&mut input.as_bytes(), 2, &CancelToken::new()).unwrap();
        assert!(excessive.is_empty());
    }

    #[test]
    fn remove_drops_listed_keys_only() {
        let input = sample_input();
        let keys: HashSet<String> = ["pt,trap)/loop".to_string()].into();

        let mut out = Vec::new();
        let stats =
            remove_stream(&mut input.as_bytes(), &keys, &mut out, &CancelToken::new()).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), OK);
        assert_eq!(stats, FilterStats { kept: 1, dropped: 5 });
    }

    #[test]
    fn load_key_set_takes_first_field_and_skips_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("excessive.txt");
        fs::write(
            &path,
            "pt,trap)/loop\t5000\n# comment\n\npt,other)/ 123\n",
        )
        .unwrap();

        let keys = load_key_set(path.to_str().unwrap()).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("pt,trap)/loop"));
        assert!(keys.contains("pt,other)/"));
    }

    #[test]
    fn auto_finds_and_removes_in_one_call() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.cdxj");
        let output = dir.path().join("out.cdxj");
        fs::write(&input, sample_input()).unwrap();

        let (found, stats) = auto(
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            2,
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(found, 1);
        assert_eq!(stats, FilterStats { kept: 1, dropped: 5 });
        assert_eq!(fs::read_to_string(&output).unwrap(), OK);
    }

    #[test]
    fn auto_rejects_stdin() {
        let err = auto("-", "-", 2, &CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("stdin"), "{err}");
    }

    #[test]
    fn blocklist_and_excessive_commute() {
        // Property: remove_E(block_B(S)) == block_B(remove_E(S)).
        let input = format!(
            "{}{}{}",
            "pt,spam,www)/ 20230101000000 {}\n".repeat(2),
            TRAP.repeat(5),
            OK
        );
        let blocklist = crate::blocklist::Blocklist::from_patterns(["^pt,spam,"]).unwrap();
        let keys: HashSet<String> = ["pt,trap)/loop".to_string()].into();
        let cancel = CancelToken::new();

        let mut blocked_first = Vec::new();
        crate::blocklist::filter_stream(
            &mut input.as_bytes(),
            &blocklist,
            &mut blocked_first,
            &cancel,
        )
        .unwrap();
        let mut order_a = Vec::new();
        remove_stream(&mut blocked_first.as_slice(), &keys, &mut order_a, &cancel).unwrap();

        let mut removed_first = Vec::new();
        remove_stream(&mut input.as_bytes(), &keys, &mut removed_first, &cancel).unwrap();
        let mut order_b = Vec::new();
        crate::blocklist::filter_stream(
            &mut removed_first.as_slice(),
            &blocklist,
            &mut order_b,
            &cancel,
        )
        .unwrap();

        assert_eq!(order_a, order_b);
        assert_eq!(String::from_utf8(order_a).unwrap(), OK);
    }
}
