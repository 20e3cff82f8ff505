//! End-to-end tests for the dredge binary

use assert_cmd::Command;
use dredge_testing::fixtures::{tar_bytes, write_tar, write_zip, zip_bytes, Compression, Entry};
use dredge_testing::TestDir;
use predicates::prelude::*;
use std::fs;

fn dredge() -> Command {
    let mut cmd = Command::cargo_bin("dredge").unwrap();
    cmd.env_remove("DREDGE_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_flags() {
    dredge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dir"))
        .stdout(predicate::str::contains("--recursive"))
        .stdout(predicate::str::contains("--suffix"));
}

#[test]
fn test_dir_is_required() {
    dredge()
        .assert()
        .failure()
        .stderr(predicate::str::contains("--dir"));
}

#[test]
fn test_extracts_flat_zip() {
    let test_dir = TestDir::new().unwrap();
    write_zip(
        &test_dir.join("data.zip"),
        &[Entry::File("a.txt", b"alpha"), Entry::File("sub/b.txt", b"beta")],
    )
    .unwrap();

    dredge()
        .arg("--dir")
        .arg(test_dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Extracted file:"))
        .stderr(predicate::str::contains("b.txt"));

    let out = test_dir.join("data.zip-extracted");
    assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"alpha");
    assert_eq!(fs::read(out.join("sub/b.txt")).unwrap(), b"beta");
}

#[test]
fn test_recursive_reports_nested_archives() {
    let test_dir = TestDir::new().unwrap();
    let inner = zip_bytes(&[Entry::File("c.txt", b"see")]).unwrap();
    write_tar(
        &test_dir.join("outer.tar"),
        &[Entry::File("inner.zip", &inner)],
        Compression::None,
    )
    .unwrap();

    dredge()
        .arg("-d")
        .arg(test_dir.path())
        .arg("-r")
        .assert()
        .success()
        .stderr(predicate::str::contains("Found nested zip archive:"));

    assert_eq!(
        fs::read(test_dir.join("outer.tar-extracted/inner.zip-extracted/c.txt")).unwrap(),
        b"see"
    );
}

#[test]
fn test_without_recursive_nested_archive_is_kept() {
    let test_dir = TestDir::new().unwrap();
    let inner = tar_bytes(&[Entry::File("c.txt", b"see")], Compression::Gzip).unwrap();
    write_zip(&test_dir.join("outer.zip"), &[Entry::File("inner.tgz", &inner)]).unwrap();

    dredge()
        .arg("--dir")
        .arg(test_dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Found nested").not());

    assert!(test_dir.join("outer.zip-extracted/inner.tgz").is_file());
    assert!(!test_dir.join("outer.zip-extracted/inner.tgz-extracted").exists());
}

#[test]
fn test_empty_directory_succeeds() {
    let test_dir = TestDir::new().unwrap();

    dredge()
        .arg("--dir")
        .arg(test_dir.path())
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_rerun_fails_with_collision_exit_code() {
    let test_dir = TestDir::new().unwrap();
    write_zip(&test_dir.join("data.zip"), &[Entry::File("a.txt", b"a")]).unwrap();

    dredge().arg("--dir").arg(test_dir.path()).assert().success();

    dredge()
        .arg("--dir")
        .arg(test_dir.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Destination already exists"));
}

#[test]
fn test_missing_directory_is_io_error() {
    let test_dir = TestDir::new().unwrap();

    dredge()
        .arg("--dir")
        .arg(test_dir.join("does-not-exist"))
        .assert()
        .code(2);
}

#[test]
fn test_quiet_suppresses_log_lines() {
    let test_dir = TestDir::new().unwrap();
    write_zip(&test_dir.join("data.zip"), &[Entry::File("a.txt", b"a")]).unwrap();

    dredge()
        .arg("--dir")
        .arg(test_dir.path())
        .arg("--quiet")
        .assert()
        .success()
        .stderr(predicate::str::is_empty());

    assert!(test_dir.join("data.zip-extracted/a.txt").is_file());
}

#[test]
fn test_json_summary() {
    let test_dir = TestDir::new().unwrap();
    write_zip(
        &test_dir.join("data.zip"),
        &[Entry::File("a.txt", b"a"), Entry::File("b.txt", b"b")],
    )
    .unwrap();

    let output = dredge()
        .arg("--dir")
        .arg(test_dir.path())
        .arg("--json")
        .arg("--quiet")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["archives"], 1);
    assert_eq!(report["entries_extracted"], 2);
    assert_eq!(report["missing_sources"], serde_json::json!([]));
}

#[test]
fn test_config_file_sets_suffix() {
    let test_dir = TestDir::new().unwrap();
    write_zip(&test_dir.join("data.zip"), &[Entry::File("a.txt", b"a")]).unwrap();
    let config = test_dir.create_file("dredge.toml", b"[extract]\nsuffix = \".d\"\n").unwrap();

    dredge()
        .arg("--dir")
        .arg(test_dir.path())
        .env("DREDGE_CONFIG", &config)
        .assert()
        .success();

    assert!(test_dir.join("data.zip.d/a.txt").is_file());
    assert!(!test_dir.join("data.zip-extracted").exists());
}

#[test]
fn test_invalid_config_fails() {
    let test_dir = TestDir::new().unwrap();
    let config = test_dir.create_file("dredge.toml", b"[extract]\nsuffix = \"\"\n").unwrap();

    dredge()
        .arg("--dir")
        .arg(test_dir.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load config"));
}
