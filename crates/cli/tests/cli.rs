use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn repoguard(ledger: &Path) -> Command {
    let mut cmd = Command::cargo_bin("repoguard").expect("binary");
    cmd.arg("--ledger").arg(ledger);
    cmd
}

fn run_json(cmd: &mut Command) -> (bool, Value) {
    let output = cmd.output().expect("command run");
    let body = serde_json::from_slice(&output.stdout).unwrap_or(Value::Null);
    (output.status.success(), body)
}

/// Writes a snapshot with one active repository owned by alice, id 1.
fn seed_ledger(path: &Path) {
    let state = json!({
        "repositories": {
            "1": {
                "id": 1,
                "owner": "alice",
                "canonical_url": "https://github.com/alice/widget",
                "content_hash": "1111111111111111111111111111111111111111111111111111111111111111",
                "code_fingerprint": "2222222222222222222222222222222222222222222222222222222222222222",
                "key_features": ["offline sync engine"],
                "license_type": "MIT",
                "registered_at": 1_700_000_000,
                "active": true
            }
        },
        "violations": {},
        "next_repository_id": 2,
        "next_violation_id": 1
    });
    fs::write(path, serde_json::to_string_pretty(&state).unwrap()).unwrap();
}

fn offline_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    fs::write(
        &path,
        "[github]\napi_root = \"http://127.0.0.1:9\"\ntimeout_secs = 1\n",
    )
    .unwrap();
    path
}

#[test]
#[allow(deprecated)]
fn help_lists_every_subcommand() {
    let mut cmd = Command::cargo_bin("repoguard").expect("binary");
    let mut assert = cmd.arg("--help").assert().success();
    for name in [
        "register",
        "compare",
        "scan",
        "report",
        "update-status",
        "update-license",
        "deactivate",
        "show",
        "list",
        "status",
    ] {
        assert = assert.stdout(predicate::str::contains(name));
    }
}

#[test]
fn status_reports_an_empty_ledger() {
    let temp = tempdir().unwrap();
    let ledger = temp.path().join("ledger.json");

    let (ok, body) = run_json(repoguard(&ledger).arg("--json").arg("status"));
    assert!(ok);
    assert_eq!(body["repositories"], 0);
    assert_eq!(body["active_repositories"], 0);
    assert_eq!(body["violations"], 0);
    assert_eq!(body["by_status"]["pending"], 0);
}

#[test]
fn a_violation_can_be_filed_and_moderated() {
    let temp = tempdir().unwrap();
    let ledger = temp.path().join("ledger.json");
    seed_ledger(&ledger);

    let (ok, body) = run_json(repoguard(&ledger).arg("--json").args([
        "report",
        "https://github.com/copy/cat",
        "--repo-id",
        "1",
        "--score",
        "88",
        "--reporter",
        "scanner",
        "--evidence",
        "identical file layout",
    ]));
    assert!(ok, "report failed: {body}");
    assert_eq!(body["id"], 1);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["violating_url"], "https://github.com/copy/cat");

    // The repository owner verifies the claim.
    let (ok, body) = run_json(repoguard(&ledger).arg("--json").args([
        "update-status",
        "1",
        "verified",
        "--actor",
        "alice",
        "--reference",
        "case-7141",
    ]));
    assert!(ok, "update failed: {body}");
    assert_eq!(body["status"], "verified");
    assert_eq!(body["resolution_reference"], "case-7141");

    // Nobody else may touch it.
    let output = repoguard(&ledger)
        .args(["update-status", "1", "disputed", "--actor", "mallory"])
        .output()
        .expect("command run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not authorized"), "stderr: {stderr}");
}

#[test]
fn a_below_threshold_claim_is_rejected_and_leaves_no_trace() {
    let temp = tempdir().unwrap();
    let ledger = temp.path().join("ledger.json");
    seed_ledger(&ledger);

    let output = repoguard(&ledger)
        .args([
            "report",
            "https://github.com/copy/cat",
            "--repo-id",
            "1",
            "--score",
            "42",
            "--reporter",
            "scanner",
        ])
        .output()
        .expect("command run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("below the admission threshold"),
        "stderr: {stderr}"
    );

    let (ok, body) = run_json(repoguard(&ledger).arg("--json").args(["list", "violations"]));
    assert!(ok);
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

#[test]
fn the_config_file_can_lower_the_admission_threshold() {
    let temp = tempdir().unwrap();
    let ledger = temp.path().join("ledger.json");
    seed_ledger(&ledger);
    let config = temp.path().join("config.toml");
    fs::write(&config, "[ledger]\nadmission_threshold = 50\n").unwrap();

    let (ok, body) = run_json(
        repoguard(&ledger)
            .arg("--config")
            .arg(&config)
            .arg("--json")
            .args([
                "report",
                "https://github.com/copy/cat",
                "--repo-id",
                "1",
                "--score",
                "55",
                "--reporter",
                "scanner",
            ]),
    );
    assert!(ok, "report failed: {body}");
    assert_eq!(body["similarity_score"], 55);
}

#[test]
fn the_config_file_supplies_the_acting_account() {
    let temp = tempdir().unwrap();
    let ledger = temp.path().join("ledger.json");
    seed_ledger(&ledger);
    let config = temp.path().join("config.toml");
    fs::write(&config, "actor = \"alice\"\n").unwrap();

    let (ok, body) = run_json(repoguard(&ledger).arg("--json").args([
        "report",
        "https://github.com/copy/cat",
        "--repo-id",
        "1",
        "--score",
        "75",
        "--reporter",
        "scanner",
    ]));
    assert!(ok, "report failed: {body}");

    // No --actor flag; the config file provides it.
    let (ok, body) = run_json(
        repoguard(&ledger)
            .arg("--config")
            .arg(&config)
            .arg("--json")
            .args(["update-status", "1", "verified"]),
    );
    assert!(ok, "update failed: {body}");
    assert_eq!(body["status"], "verified");
}

#[test]
fn show_and_list_print_the_seeded_repository() {
    let temp = tempdir().unwrap();
    let ledger = temp.path().join("ledger.json");
    seed_ledger(&ledger);

    let (ok, body) = run_json(repoguard(&ledger).arg("--json").args(["show", "1"]));
    assert!(ok);
    assert_eq!(body["repository"]["owner"], "alice");
    assert_eq!(body["violations"].as_array().map(Vec::len), Some(0));

    let output = repoguard(&ledger)
        .args(["list", "repos"])
        .output()
        .expect("command run");
    assert!(output.status.success());
    let listing = String::from_utf8_lossy(&output.stdout);
    assert!(listing.contains("https://github.com/alice/widget"));
    assert!(listing.contains("alice"));
    assert!(listing.contains("active"));
}

#[test]
fn register_rejects_a_malformed_url() {
    let temp = tempdir().unwrap();
    let ledger = temp.path().join("ledger.json");

    repoguard(&ledger)
        .args(["register", "not a url", "--owner", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid repository URL"));
}

#[test]
fn reporting_against_an_unknown_repository_fails() {
    let temp = tempdir().unwrap();
    let ledger = temp.path().join("ledger.json");

    repoguard(&ledger)
        .args([
            "report",
            "https://github.com/copy/cat",
            "--repo-id",
            "7",
            "--score",
            "90",
            "--reporter",
            "scanner",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found or inactive"));
}

#[test]
fn compare_still_prints_a_report_when_the_api_is_unreachable() {
    let temp = tempdir().unwrap();
    let ledger = temp.path().join("ledger.json");
    let config = offline_config(temp.path());

    let (ok, body) = run_json(
        repoguard(&ledger)
            .arg("--config")
            .arg(&config)
            .arg("--json")
            .args([
                "compare",
                "https://github.com/alice/widget",
                "https://github.com/copy/cat",
            ]),
    );
    assert!(ok, "compare failed: {body}");
    assert_eq!(body["report"]["composite"], 0.0);
    assert_eq!(body["recommendation"], "Minimal similarity: no action needed.");
}

#[test]
fn scan_fails_cleanly_when_the_host_api_is_unreachable() {
    let temp = tempdir().unwrap();
    let ledger = temp.path().join("ledger.json");
    seed_ledger(&ledger);
    let config = offline_config(temp.path());

    let output = repoguard(&ledger)
        .arg("--config")
        .arg(&config)
        .args(["scan", "--repo-id", "1"])
        .output()
        .expect("command run");
    assert!(!output.status.success());

    // The failed scan must not have touched the ledger.
    let (ok, body) = run_json(repoguard(&ledger).arg("--json").args(["list", "violations"]));
    assert!(ok);
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}
