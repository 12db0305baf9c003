use std::fs;

use anyhow::Result;
use tempfile::tempdir;

use crate::{resolve_inputs, MergeInput};

fn names(inputs: &[MergeInput]) -> Vec<String> {
    inputs
        .iter()
        .map(|i| match i {
            MergeInput::Stdin => "-".to_string(),
            MergeInput::Path(p) => p.file_name().unwrap().to_string_lossy().into_owned(),
        })
        .collect()
}

#[test]
fn walks_directories_collecting_cdxj_only() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("b.cdxj"), "")?;
    fs::write(dir.path().join("a.cdxj"), "")?;
    fs::write(dir.path().join("notes.txt"), "")?;
    fs::create_dir(dir.path().join("sub"))?;
    fs::write(dir.path().join("sub/c.cdxj"), "")?;

    let inputs = resolve_inputs(&[dir.path().to_string_lossy().into_owned()], &[])?;
    assert_eq!(names(&inputs), vec!["a.cdxj", "b.cdxj", "c.cdxj"]);
    Ok(())
}

#[test]
fn exclusion_patterns_match_basenames() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("keep.cdxj"), "")?;
    fs::write(dir.path().join("skip-open.cdxj"), "")?;

    let inputs = resolve_inputs(
        &[dir.path().to_string_lossy().into_owned()],
        &["*-open.cdxj".to_string()],
    )?;
    assert_eq!(names(&inputs), vec!["keep.cdxj"]);
    Ok(())
}

#[test]
fn explicit_files_are_subject_to_exclusion() -> Result<()> {
    let dir = tempdir()?;
    let tmp = dir.path().join("x-tmp.cdxj");
    fs::write(&tmp, "")?;

    let inputs = resolve_inputs(
        &[tmp.to_string_lossy().into_owned()],
        &["*-tmp.cdxj".to_string()],
    )?;
    assert!(inputs.is_empty());
    Ok(())
}

#[test]
fn stdin_cannot_join_directory_inputs() -> Result<()> {
    let dir = tempdir()?;
    let err = resolve_inputs(
        &["-".to_string(), dir.path().to_string_lossy().into_owned()],
        &[],
    )
    .unwrap_err();
    assert!(err.to_string().contains("stdin"), "{err}");
    Ok(())
}

#[test]
fn stdin_alone_is_a_single_source() -> Result<()> {
    let inputs = resolve_inputs(&["-".to_string()], &[])?;
    assert_eq!(inputs, vec![MergeInput::Stdin]);
    Ok(())
}

#[test]
fn missing_path_is_an_error() {
    let err = resolve_inputs(&["/no/such/file.cdxj".to_string()], &[]).unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
}

#[test]
fn invalid_exclude_pattern_is_an_error() {
    let err = resolve_inputs(&[], &["[".to_string()]).unwrap_err();
    assert!(err.to_string().contains("invalid exclude pattern"), "{err}");
}
