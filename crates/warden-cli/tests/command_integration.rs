//! Integration tests for CLI commands.
//!
//! Each test writes policy and subject files into a temp directory and runs
//! the binary there, so the default `[store]` paths pick them up.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();

    let seed = Command::cargo_bin("warden")
        .unwrap()
        .current_dir(temp.path())
        .arg("seed")
        .output()
        .unwrap();
    assert!(seed.status.success());
    fs::write(temp.path().join("policies.json"), seed.stdout).unwrap();

    let subjects = json!([
        {"id": 1, "username": "root", "roles": ["admin"]},
        {"id": 5, "username": "alice", "roles": ["standard_user"]},
        {"id": 9, "username": "gone", "roles": ["admin"], "is_active": false}
    ]);
    fs::write(temp.path().join("subjects.json"), subjects.to_string()).unwrap();

    let file = json!({"id": 10, "user_id": 5, "name": "report.pdf"});
    fs::write(temp.path().join("file-10.json"), file.to_string()).unwrap();

    let rows = json!([
        {"id": 10, "user_id": 5, "name": "report.pdf"},
        {"id": 11, "user_id": 6, "name": "secret.pdf"},
        {"id": 12, "user_id": 5, "name": "notes.txt"}
    ]);
    fs::write(temp.path().join("rows.json"), rows.to_string()).unwrap();

    temp
}

fn warden(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("warden").unwrap();
    cmd.current_dir(dir.path()).arg("--no-color");
    cmd
}

// ============================================================================
// validate
// ============================================================================

#[test]
fn validate_accepts_seed_policies() {
    let temp = project();
    warden(&temp)
        .args(["validate", "policies.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Allow User to Manage Their Own Files"))
        .stdout(predicate::str::contains("6 policies valid"));
}

#[test]
fn validate_reports_rejected_documents() {
    let temp = project();
    let policies = json!([
        {"name": "ok", "actions": ["read"], "resources": ["file"]},
        {"name": "bad-op", "resources": ["file"], "subjects": [{"key": "user.id", "operator": "like", "value": ["1"]}]}
    ]);
    fs::write(temp.path().join("mixed.json"), policies.to_string()).unwrap();

    warden(&temp)
        .args(["validate", "mixed.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad-op"))
        .stderr(predicate::str::contains("like"))
        .stderr(predicate::str::contains("1 of 2 policies rejected"));
}

#[test]
fn validate_rejects_non_array() {
    let temp = project();
    fs::write(temp.path().join("object.json"), "{}").unwrap();

    warden(&temp)
        .args(["validate", "object.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a JSON array"));
}

// ============================================================================
// check
// ============================================================================

#[test]
fn check_allows_owner() {
    let temp = project();
    warden(&temp)
        .args([
            "check", "--subject-id", "5", "--action", "update", "--resource-type", "file",
            "--resource", "file-10.json", "--explain",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("ALLOW"))
        .stdout(predicate::str::contains("Allow User to Manage Their Own Files"));
}

#[test]
fn check_denies_without_ownership_record() {
    let temp = project();
    warden(&temp)
        .args([
            "check", "--subject-id", "5", "--action", "update", "--resource-type", "file",
            "--resource-id", "10", "--explain",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("DENY"))
        .stdout(predicate::str::contains("denying by default"));
}

#[test]
fn check_denies_owner_policies_for_a_bare_type() {
    let temp = project();
    warden(&temp)
        .args(["check", "--subject-id", "5", "--action", "delete", "--resource-type", "file"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DENY"));
}

#[test]
fn check_denies_inactive_subject() {
    let temp = project();
    warden(&temp)
        .args([
            "check", "--subject-id", "9", "--action", "read", "--resource-type", "chat", "--explain",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("DENY"))
        .stdout(predicate::str::contains("inactive"));
}

#[test]
fn check_with_explicit_store_paths() {
    let temp = project();
    let elsewhere = TempDir::new().unwrap();
    let policies = temp.path().join("policies.json");
    let subjects = temp.path().join("subjects.json");

    warden(&elsewhere)
        .args([
            "check", "--policies", policies.to_str().unwrap(), "--subjects",
            subjects.to_str().unwrap(), "--subject-id", "1", "--action", "delete",
            "--resource-type", "policy",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("ALLOW"));
}

#[test]
fn check_missing_policy_file() {
    let temp = TempDir::new().unwrap();
    warden(&temp)
        .args(["check", "--subject-id", "1", "--action", "read", "--resource-type", "file"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Policy file not found"));
}

// ============================================================================
// filter
// ============================================================================

#[test]
fn filter_prints_expression() {
    let temp = project();
    warden(&temp)
        .args(["filter", "--subject-id", "5", "--action", "read_list", "--resource-type", "file"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(user_id == 5)"));

    warden(&temp)
        .args(["filter", "--subject-id", "1", "--action", "read_list", "--resource-type", "file"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ALL"));
}

#[test]
fn filter_renders_sql() {
    let temp = project();
    warden(&temp)
        .args([
            "filter", "--subject-id", "5", "--action", "read_list", "--resource-type", "file", "--sql",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("(user_id = ?)"))
        .stdout(predicate::str::contains("params: 5"));

    warden(&temp)
        .args([
            "filter", "--subject-id", "5", "--action", "read_list", "--resource-type", "role", "--sql",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("1=0"));
}

#[test]
fn filter_applies_to_rows() {
    let temp = project();
    warden(&temp)
        .args([
            "filter", "--subject-id", "5", "--action", "read_list", "--resource-type", "file",
            "--rows", "rows.json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("report.pdf"))
        .stdout(predicate::str::contains("notes.txt"))
        .stdout(predicate::str::contains("secret.pdf").not())
        .stdout(predicate::str::contains("(2 rows)"));
}
