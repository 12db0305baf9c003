use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::tempdir;

use crate::{merge, MergeInput, MergeOptions};

fn write_file(dir: &Path, name: &str, contents: &str) -> MergeInput {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    MergeInput::Path(path)
}

fn merge_to_string(inputs: Vec<MergeInput>, opts: &MergeOptions) -> Result<String> {
    let dir = tempdir()?;
    let out = dir.path().join("out.cdxj");
    merge(inputs, out.to_str().unwrap(), opts)?;
    Ok(fs::read_to_string(&out)?)
}

#[test]
fn merges_two_sorted_streams() -> Result<()> {
    let dir = tempdir()?;
    let a = write_file(
        dir.path(),
        "a.cdxj",
        "com,a)/ 20230101000000 {\"s\":200}\ncom,b)/ 20230101000000 {\"s\":200}\n",
    );
    let b = write_file(
        dir.path(),
        "b.cdxj",
        "com,a)/ 20230201000000 {\"s\":200}\ncom,c)/ 20230101000000 {\"s\":200}\n",
    );

    let merged = merge_to_string(vec![a, b], &MergeOptions::default())?;
    assert_eq!(
        merged,
        "com,a)/ 20230101000000 {\"s\":200}\n\
         com,a)/ 20230201000000 {\"s\":200}\n\
         com,b)/ 20230101000000 {\"s\":200}\n\
         com,c)/ 20230101000000 {\"s\":200}\n"
    );
    Ok(())
}

#[test]
fn preserves_multiset_and_sort_order() -> Result<()> {
    let dir = tempdir()?;

    // Three inputs with interleaved and duplicated keys.
    let mut lines: Vec<Vec<String>> = vec![Vec::new(), Vec::new(), Vec::new()];
    for i in 0..90 {
        let line = format!("com,site{:03})/ 20230101000000 {{\"n\":{}}}", i % 30, i);
        lines[i % 3].push(line);
    }
    let mut inputs = Vec::new();
    for (idx, mut chunk) in lines.into_iter().enumerate() {
        chunk.sort();
        inputs.push(write_file(
            dir.path(),
            &format!("{idx}.cdxj"),
            &(chunk.join("\n") + "\n"),
        ));
    }

    let merged = merge_to_string(inputs, &MergeOptions::default())?;
    let out_lines: Vec<&str> = merged.lines().collect();
    assert_eq!(out_lines.len(), 90);

    let mut sorted = out_lines.clone();
    sorted.sort();
    assert_eq!(out_lines, sorted, "output must be sorted");
    Ok(())
}

#[test]
fn equal_lines_merge_deterministically() -> Result<()> {
    let dir = tempdir()?;
    let line = "com,a)/ 20230101000000 {\"s\":200}\n";
    let a = write_file(dir.path(), "a.cdxj", line);
    let b = write_file(dir.path(), "b.cdxj", line);

    let first = merge_to_string(vec![a.clone(), b.clone()], &MergeOptions::default())?;
    let second = merge_to_string(vec![a, b], &MergeOptions::default())?;

    assert_eq!(first, line.repeat(2));
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn unsorted_source_aborts_and_leaves_no_output() -> Result<()> {
    let dir = tempdir()?;
    let bad = write_file(
        dir.path(),
        "bad.cdxj",
        "com,b)/ 20230101000000 {\"s\":200}\ncom,a)/ 20230101000000 {\"s\":200}\n",
    );

    let out = dir.path().join("out.cdxj");
    let err = merge(vec![bad], out.to_str().unwrap(), &MergeOptions::default()).unwrap_err();
    assert!(err.to_string().contains("unsorted input"), "{err}");
    assert!(!out.exists(), "failed merge must not leave an output file");
    assert!(!dir.path().join("out.cdxj.tmp").exists());
    Ok(())
}

#[test]
fn malformed_line_aborts() -> Result<()> {
    let dir = tempdir()?;
    let bad = write_file(dir.path(), "bad.cdxj", "com,a)/only-one-field\n");

    let out = dir.path().join("out.cdxj");
    let err = merge(vec![bad], out.to_str().unwrap(), &MergeOptions::default()).unwrap_err();
    assert!(err.to_string().contains("malformed line"), "{err}");
    Ok(())
}

#[test]
fn empty_input_file_contributes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let empty = write_file(dir.path(), "empty.cdxj", "");
    let a = write_file(dir.path(), "a.cdxj", "com,a)/ 20230101000000 {\"s\":200}\n");

    let merged = merge_to_string(vec![empty, a], &MergeOptions::default())?;
    assert_eq!(merged, "com,a)/ 20230101000000 {\"s\":200}\n");
    Ok(())
}

#[test]
fn staged_fan_in_matches_direct_merge() -> Result<()> {
    let dir = tempdir()?;
    let mut inputs = Vec::new();
    for i in 0..7 {
        inputs.push(write_file(
            dir.path(),
            &format!("{i}.cdxj"),
            &format!("com,site{i})/ 20230101000000 {{\"n\":{i}}}\n"),
        ));
    }

    let direct = merge_to_string(inputs.clone(), &MergeOptions::default())?;

    let staged_opts = MergeOptions {
        max_open_sources: 2,
        ..MergeOptions::default()
    };
    let staged = merge_to_string(inputs, &staged_opts)?;

    assert_eq!(direct, staged);
    assert_eq!(staged.lines().count(), 7);
    Ok(())
}

#[test]
fn reports_line_counts() -> Result<()> {
    let dir = tempdir()?;
    let a = write_file(
        dir.path(),
        "a.cdxj",
        "com,a)/ 20230101000000 {}\ncom,b)/ 20230101000000 {}\n",
    );
    let out = dir.path().join("out.cdxj");
    let stats = merge(vec![a], out.to_str().unwrap(), &MergeOptions::default())?;
    assert_eq!(stats.sources, 1);
    assert_eq!(stats.lines_written, 2);
    Ok(())
}

#[test]
fn cancelled_merge_leaves_no_output() -> Result<()> {
    let dir = tempdir()?;
    let a = write_file(dir.path(), "a.cdxj", "com,a)/ 20230101000000 {}\n");

    let opts = MergeOptions::default();
    opts.cancel.cancel();

    let out = dir.path().join("out.cdxj");
    let err = merge(vec![a], out.to_str().unwrap(), &opts).unwrap_err();
    assert!(err.to_string().contains("cancelled"), "{err}");
    assert!(!out.exists());
    Ok(())
}
