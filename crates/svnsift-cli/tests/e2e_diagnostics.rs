//! E2E tests for the diagnostic commands: `query`, `strip`, `completions`,
//! plus help and timing output.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DUMP: &str = "SVN-fs-dump-format-version: 2\n\n\
Revision-number: 0\nProp-content-length: 10\nContent-length: 10\n\nPROPS-END\n\n\
Revision-number: 1\nProp-content-length: 10\nContent-length: 10\n\nPROPS-END\n\n\
Node-path: trunk\nNode-kind: dir\nNode-action: add\n\n\n\
Node-path: trunk/a.txt\nNode-kind: file\nNode-action: add\nText-content-length: 6\nContent-length: 6\n\nalpha\n\n\n\
Node-path: tags\nNode-kind: dir\nNode-action: add\n\n\n\
Revision-number: 2\nProp-content-length: 10\nContent-length: 10\n\nPROPS-END\n\n\
Node-path: tags/v1\nNode-kind: dir\nNode-action: add\nNode-copyfrom-rev: 1\nNode-copyfrom-path: trunk\n\n\n\
Revision-number: 3\nProp-content-length: 10\nContent-length: 10\n\nPROPS-END\n\n\
Node-path: trunk/b.txt\nNode-kind: file\nNode-action: add\nText-content-length: 5\nContent-length: 5\n\nbeta\n\n\n";

fn sift_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("svnsift"));
    cmd.current_dir(dir);
    cmd.env("SVNSIFT_LOG", "error");
    cmd.env("XDG_CONFIG_HOME", dir.join("config"));
    cmd.env_remove("SVNSIFT_FORMAT");
    cmd.env_remove("SVNSIFT_TIMING");
    cmd
}

fn setup() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("repo.dump"), DUMP).expect("write dump");
    dir
}

// ---------------------------------------------------------------------------
// query
// ---------------------------------------------------------------------------

#[test]
fn query_explains_dependency_in_json() {
    let dir = setup();
    let output = sift_cmd(dir.path())
        .args(["query", "repo.dump", "trunk", "-i", "tags/v1", "--json"])
        .output()
        .expect("run");
    assert!(
        output.status.success(),
        "query failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let kept = json[0]["kept"].as_array().expect("kept array");
    assert_eq!(json[0]["path"], "trunk");
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0]["reason"], "required");
    assert_eq!(kept[0]["event"]["revision"], 1);
    assert_eq!(kept[0]["chain"][0]["path"], "tags/v1");
}

#[test]
fn query_text_marks_unkept_paths() {
    let dir = setup();
    sift_cmd(dir.path())
        .args(["query", "repo.dump", "tags/v1", "trunk/b.txt", "-i", "tags/v1", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tags/v1\tr2 add tags/v1\tselected\n"))
        .stdout(predicate::str::contains("trunk/b.txt\tnot-kept\n"));
}

#[test]
fn query_writes_no_files() {
    let dir = setup();
    sift_cmd(dir.path())
        .args(["query", "repo.dump", "trunk", "-e", "tags"])
        .assert()
        .success();
    let entries = fs::read_dir(dir.path()).expect("list").count();
    assert_eq!(entries, 1);
}

// ---------------------------------------------------------------------------
// strip
// ---------------------------------------------------------------------------

#[test]
fn strip_drops_text_and_stays_loadable() {
    let dir = setup();
    sift_cmd(dir.path())
        .args(["strip", "repo.dump", "skeleton.dump", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("records 10\n"))
        .stdout(predicate::str::contains("nodes_stripped 2\n"))
        .stdout(predicate::str::contains("bytes_dropped 11\n"));

    let skeleton = fs::read_to_string(dir.path().join("skeleton.dump")).expect("written");
    assert!(!skeleton.contains("alpha"));
    assert!(skeleton.contains("Text-content-length: 0\nContent-length: 0\n"));

    // The skeleton is itself a valid dump.
    sift_cmd(dir.path())
        .args(["filter", "skeleton.dump", "out.dump", "-i", "/"])
        .assert()
        .success();
    let refiltered = fs::read_to_string(dir.path().join("out.dump")).expect("written");
    assert_eq!(refiltered, skeleton);
}

#[test]
fn strip_missing_input_exits_3() {
    let dir = setup();
    sift_cmd(dir.path())
        .args(["strip", "absent.dump", "skeleton.dump"])
        .assert()
        .code(3);
}

// ---------------------------------------------------------------------------
// completions, help, timing
// ---------------------------------------------------------------------------

#[test]
fn completions_generate_for_bash() {
    let dir = setup();
    sift_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("svnsift"));
}

#[test]
fn help_lists_subcommands_with_examples() {
    let dir = setup();
    sift_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("filter"))
        .stdout(predicate::str::contains("strip"));
    sift_cmd(dir.path())
        .args(["filter", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EXAMPLES:"));
}

#[test]
fn timing_report_goes_to_stderr() {
    let dir = setup();
    sift_cmd(dir.path())
        .args(["--timing", "filter", "repo.dump", "out.dump", "-i", "trunk", "--json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("timing report:"))
        .stderr(predicate::str::contains("rewrite"));
}
