//! Smoke tests for the vigil CLI
//!
//! These run the demo gallery suite end to end through the binary.

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn vigil() -> Command {
    Command::cargo_bin("vigil").expect("vigil binary should exist")
}

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

fn gallery_run(dir: &TempDir, engine: &str) -> Command {
    let mut cmd = vigil();
    cmd.env_remove("VIGIL_ENGINE")
        .env_remove("VIGIL_UPDATE_SNAPSHOTS")
        .env_remove("VIGIL_SNAPSHOT_DIR")
        .arg("run")
        .arg("--suite")
        .arg(demo("video_gallery.suite.yaml"))
        .arg("--fixture")
        .arg(demo("video_gallery.fixture.yaml"))
        .arg("--engine")
        .arg(engine)
        .arg("--snapshot-dir")
        .arg(dir.path().join("refs"))
        .arg("--artifact-dir")
        .arg(dir.path().join("artifacts"));
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    vigil()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.3.0"));
}

#[test]
fn test_help_lists_subcommands() {
    vigil()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_no_args_is_usage_error() {
    vigil().assert().code(2);
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_gallery_passes_on_firefox() {
    let dir = TempDir::new().unwrap();
    gallery_run(&dir, "firefox")
        .arg("--color")
        .arg("never")
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS video_end_time[5]"))
        .stdout(predicate::str::contains("PASS video_end_time_loop[8]"))
        .stdout(predicate::str::contains("0 failed"));
    assert!(dir.path().join("refs/video_element_first.png").exists());
}

#[test]
fn test_gallery_skips_on_chromium() {
    let dir = TempDir::new().unwrap();
    gallery_run(&dir, "chromium")
        .args(["--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SKIP video_rendering (skipped on chromium: missing codecs"))
        .stdout(predicate::str::contains("SKIP video_end_time[6]"));
}

#[test]
fn test_json_report() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("report.json");
    let assert = gallery_run(&dir, "webkit")
        .args(["--format", "json", "--output"])
        .arg(&out)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["engine"], "webkit");
    assert_eq!(report["suite"], "video_gallery");
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();
    assert_eq!(written["cases"], report["cases"]);
}

#[test]
fn test_junit_report() {
    let dir = TempDir::new().unwrap();
    gallery_run(&dir, "firefox")
        .args(["--format", "junit"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("<?xml"))
        .stdout(predicate::str::contains("<testsuite name=\"video_gallery\""));
}

#[test]
fn test_failing_case_exits_one() {
    let dir = TempDir::new().unwrap();
    let suite = dir.path().join("failing.yaml");
    fs::write(
        &suite,
        "name: failing\ncases:\n  - name: wrong_count\n    steps:\n      - action: count\n        target: {test_id: stVideo}\n        equals: 12\n",
    )
    .unwrap();
    let config = dir.path().join("vigil.yaml");
    fs::write(&config, "assert_timeout_ms: 200\n").unwrap();

    vigil()
        .env_remove("VIGIL_ENGINE")
        .arg("run")
        .arg("--suite")
        .arg(&suite)
        .arg("--fixture")
        .arg(demo("video_gallery.fixture.yaml"))
        .arg("--config")
        .arg(&config)
        .args(["--color", "never"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAIL wrong_count at 'count stVideo == 12'"))
        .stdout(predicate::str::contains("expected 12, got 11"));
}

#[test]
fn test_fail_fast_reports_not_run() {
    let dir = TempDir::new().unwrap();
    let suite = dir.path().join("failing.yaml");
    fs::write(
        &suite,
        "name: ff\ncases:\n  - name: a\n    steps:\n      - {action: count, target: {test_id: stVideo}, equals: 1}\n  - name: b\n    steps: []\n  - name: c\n    steps: []\n",
    )
    .unwrap();
    let config = dir.path().join("vigil.yaml");
    fs::write(&config, "assert_timeout_ms: 100\n").unwrap();

    vigil()
        .env_remove("VIGIL_ENGINE")
        .arg("run")
        .arg("-s")
        .arg(&suite)
        .arg("-x")
        .arg(demo("video_gallery.fixture.yaml"))
        .arg("-c")
        .arg(&config)
        .args(["--fail-fast", "--color", "never"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("2 not run"));
}

#[test]
fn test_missing_suite_is_config_error() {
    vigil()
        .arg("run")
        .args(["--suite", "/nonexistent/suite.yaml"])
        .arg("--fixture")
        .arg(demo("video_gallery.fixture.yaml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read suite"));
}

#[test]
fn test_invalid_suite_is_config_error() {
    let dir = TempDir::new().unwrap();
    let suite = dir.path().join("bad.yaml");
    fs::write(&suite, "name: bad\ncases:\n  - name: x\n    steps:\n      - action: hover\n").unwrap();
    vigil()
        .arg("run")
        .arg("--suite")
        .arg(&suite)
        .arg("--fixture")
        .arg(demo("video_gallery.fixture.yaml"))
        .assert()
        .code(2);
}

#[test]
fn test_empty_suite_is_config_error() {
    let dir = TempDir::new().unwrap();
    let suite = dir.path().join("empty.yaml");
    fs::write(&suite, "name: empty\ncases: []\n").unwrap();
    vigil()
        .arg("list")
        .arg("--suite")
        .arg(&suite)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("has no cases"));
}

// ============================================================================
// list
// ============================================================================

#[test]
fn test_list_on_webkit() {
    vigil()
        .arg("list")
        .arg("--suite")
        .arg(demo("video_gallery.suite.yaml"))
        .args(["--engine", "webkit", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SKIP video_rendering_webm (skipped on webkit)"))
        .stdout(predicate::str::contains("RUN  video_end_time[6]"))
        .stdout(predicate::str::contains("case(s) would run"));
}
