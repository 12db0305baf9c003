//! End-to-end tests driving the cdxtools binary the way operators do:
//! arguments, stdin/stdout pipelines, and on-disk artifacts.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::tempdir;

/// Runs the cdxtools binary with `args`, feeding `stdin` if given.
fn run_cdxtools(args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_cdxtools"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn cdxtools");

    if let Some(input) = stdin {
        child
            .stdin
            .as_mut()
            .expect("stdin piped")
            .write_all(input.as_bytes())
            .expect("failed to write stdin");
    }
    drop(child.stdin.take());

    child.wait_with_output().expect("failed to wait for cdxtools")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write_file(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn merge_two_files_to_stdout() {
    let dir = tempdir().unwrap();
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

    let output = run_cdxtools(&["merge", "-", &a, &b], None);
    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output),
        "com,a)/ 20230101000000 {\"s\":200}\n\
         com,a)/ 20230201000000 {\"s\":200}\n\
         com,b)/ 20230101000000 {\"s\":200}\n\
         com,c)/ 20230101000000 {\"s\":200}\n"
    );
}

#[test]
fn merge_unsorted_input_fails_with_diagnostic() {
    let dir = tempdir().unwrap();
    let bad = write_file(
        dir.path(),
        "bad.cdxj",
        "com,b)/ 20230101000000 {}\ncom,a)/ 20230101000000 {}\n",
    );

    let out_path = dir.path().join("out.cdxj");
    let output = run_cdxtools(&["merge", out_path.to_str().unwrap(), &bad], None);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsorted input"), "stderr: {stderr}");
    assert!(!out_path.exists());
}

#[test]
fn blocklist_filter_over_a_pipe() {
    let dir = tempdir().unwrap();
    let blocklist = write_file(dir.path(), "blocklist.txt", "# spam\n^pt,spam,\n");

    let input = "pt,good)/ 20240101000000 {\"s\":200}\n\
                 pt,spam,www)/ 20240101000000 {\"s\":200}\n\
                 pt,zoo)/ 20240101000000 {\"s\":200}\n";
    let output = run_cdxtools(
        &["filter-blocklist", "-i", "-", "-b", &blocklist],
        Some(input),
    );

    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output),
        "pt,good)/ 20240101000000 {\"s\":200}\npt,zoo)/ 20240101000000 {\"s\":200}\n"
    );
}

#[test]
fn excessive_find_report_format() {
    let input = format!(
        "{}pt,ok)/ 20230101000000 {{}}\n",
        "pt,trap)/loop 20230101000000 {}\n".repeat(5)
    );
    let output = run_cdxtools(
        &["filter-excessive-urls", "find", "-i", "-", "-n", "2"],
        Some(&input),
    );

    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output),
        "pt,trap)/loop\t5\n# Found 1 URLs with > 2 occurrences\n"
    );
}

#[test]
fn excessive_auto_rejects_stdin() {
    let output = run_cdxtools(
        &["filter-excessive-urls", "auto", "-i", "-"],
        Some("pt,a)/ 20230101000000 {}\n"),
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("stdin"), "stderr: {stderr}");
}

#[test]
fn addfield_constants_over_a_pipe() {
    let output = run_cdxtools(
        &["addfield", "-i", "-", "-f", "collection=AWP999"],
        Some("pt,a)/ 20230101000000 {\"status\":\"200\"}\n"),
    );
    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output),
        "pt,a)/ 20230101000000 {\"status\":\"200\",\"collection\":\"AWP999\"}\n"
    );
}

#[test]
fn addfield_requires_a_field_source() {
    let output = run_cdxtools(&["addfield", "-i", "-"], Some(""));
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--field"), "stderr: {stderr}");
}

#[test]
fn zipnum_round_trip_through_the_binary() {
    let dir = tempdir().unwrap();
    let input = "com,a)/ 20230101000000 {\"n\":1}\n\
                 com,b)/ 20230101000000 {\"n\":2}\n\
                 com,c)/ 20230101000000 {\"n\":3}\n";
    let indexes = dir.path().join("indexes");

    let encode = run_cdxtools(
        &[
            "zipnum-encode",
            "-i",
            "-",
            "-o",
            indexes.to_str().unwrap(),
            "--chunk-size",
            "2",
            "--base",
            "arch",
        ],
        Some(input),
    );
    assert!(encode.status.success());
    assert!(indexes.join("arch.idx").is_file());
    assert!(indexes.join("arch.loc").is_file());
    assert!(indexes.join("arch.cdx.gz").is_file());

    let decode = run_cdxtools(
        &["zipnum-decode", "-i", indexes.join("arch.idx").to_str().unwrap()],
        None,
    );
    assert!(decode.status.success());
    assert_eq!(stdout_of(&decode), input);
}

#[test]
fn search_host_match_via_url() {
    let dir = tempdir().unwrap();
    let index = write_file(
        dir.path(),
        "captures.cdxj",
        "com,example)/ 20230101000000 {\"s\":200}\n\
         com,example)/a 20230101000000 {\"s\":200}\n\
         com,example,www)/ 20230101000000 {\"s\":200}\n\
         com,other)/ 20230101000000 {\"s\":200}\n",
    );

    let output = run_cdxtools(
        &[
            "search",
            "--url",
            "http://example.com/ignored",
            "--match-type",
            "host",
            &index,
        ],
        None,
    );
    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output),
        "com,example)/ 20230101000000 {\"s\":200}\n\
         com,example)/a 20230101000000 {\"s\":200}\n\
         com,example,www)/ 20230101000000 {\"s\":200}\n"
    );
}

#[test]
fn search_with_date_range_and_field_filter() {
    let dir = tempdir().unwrap();
    let index = write_file(
        dir.path(),
        "captures.cdxj",
        "com,example)/ 20200601000000 {\"status\":\"200\"}\n\
         com,example)/ 20210601000000 {\"status\":\"404\"}\n\
         com,example)/ 20220601000000 {\"status\":\"200\"}\n\
         com,example)/ 20230601000000 {\"status\":\"404\"}\n\
         com,example)/ 20240601000000 {\"status\":\"200\"}\n",
    );

    let output = run_cdxtools(
        &[
            "search",
            "--surt",
            "com,example)/",
            "--from",
            "2022",
            "--to",
            "2023",
            "--filter",
            "status=200",
            &index,
        ],
        None,
    );
    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output),
        "com,example)/ 20220601000000 {\"status\":\"200\"}\n"
    );
}

#[test]
fn full_pipeline_merge_filter_encode_search() {
    let dir = tempdir().unwrap();
    let a = write_file(
        dir.path(),
        "a.cdxj",
        "com,keep)/ 20230101000000 {\"status\":\"200\"}\n\
         pt,spam,www)/ 20230101000000 {\"status\":\"200\"}\n",
    );
    let b = write_file(
        dir.path(),
        "b.cdxj",
        "com,keep)/a 20230101000000 {\"status\":\"200\"}\n",
    );
    let blocklist = write_file(dir.path(), "blocklist.txt", "^pt,spam,\n");

    let merged = run_cdxtools(&["merge", "-", &a, &b], None);
    assert!(merged.status.success());

    let filtered = run_cdxtools(
        &["filter-blocklist", "-i", "-", "-b", &blocklist],
        Some(&stdout_of(&merged)),
    );
    assert!(filtered.status.success());

    let indexes = dir.path().join("indexes");
    let encoded = run_cdxtools(
        &[
            "zipnum-encode",
            "-i",
            "-",
            "-o",
            indexes.to_str().unwrap(),
            "--base",
            "arch",
        ],
        Some(&stdout_of(&filtered)),
    );
    assert!(encoded.status.success());

    let found = run_cdxtools(
        &[
            "search",
            "--surt",
            "com,keep)/",
            "--match-type",
            "prefix",
            indexes.join("arch.idx").to_str().unwrap(),
        ],
        None,
    );
    assert!(found.status.success());
    assert_eq!(
        stdout_of(&found),
        "com,keep)/ 20230101000000 {\"status\":\"200\"}\n\
         com,keep)/a 20230101000000 {\"status\":\"200\"}\n"
    );
}
