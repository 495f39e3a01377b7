//! Focused CLI argument parsing tests.
//!
//! Tests that verify command-line argument parsing works correctly without
//! touching any policy or subject files.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn warden(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("warden").unwrap();
    cmd.current_dir(dir.path()).arg("--no-color");
    cmd
}

// ============================================================================
// Commands That Need No Files
// ============================================================================

#[test]
fn version_flag_shows_version() {
    Command::cargo_bin("warden")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("warden"));
}

#[test]
fn help_flag_shows_usage() {
    Command::cargo_bin("warden")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn attributes_lists_vocabulary() {
    let temp = TempDir::new().unwrap();
    warden(&temp)
        .arg("attributes")
        .assert()
        .success()
        .stdout(predicate::str::contains("user.roles"))
        .stdout(predicate::str::contains("environment.current_time"));
}

#[test]
fn seed_prints_standard_policies() {
    let temp = TempDir::new().unwrap();
    let output = warden(&temp).arg("seed").assert().success().get_output().stdout.clone();

    let documents: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let documents = documents.as_array().unwrap();
    assert_eq!(documents.len(), 6);
    assert_eq!(documents[0]["name"], "Allow Admin Full Access");
    assert_eq!(documents[0]["is_active"], 1);
}

#[test]
fn config_show_defaults() {
    let temp = TempDir::new().unwrap();
    warden(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("policy_key = \"abac_policies\""))
        .stdout(predicate::str::contains("subject_key_prefix = \"abac_subject:\""));
}

#[test]
fn config_show_json() {
    let temp = TempDir::new().unwrap();
    warden(&temp)
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"policy_ttl_secs\": 1800"));
}

#[test]
fn config_show_rejects_unknown_format() {
    let temp = TempDir::new().unwrap();
    warden(&temp)
        .args(["config", "show", "--format", "yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown format"));
}

// ============================================================================
// Configuration Sources
// ============================================================================

#[test]
fn environment_overrides_project_file() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("warden.toml"), "[cache]\npolicy_ttl_secs = 60\n").unwrap();

    warden(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("policy_ttl_secs = 60"));

    warden(&temp)
        .env("WARDEN_CACHE__POLICY_TTL_SECS", "90")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("policy_ttl_secs = 90"));
}

#[test]
fn explicit_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("custom.toml");
    std::fs::write(&path, "[cache]\npolicy_key = \"custom_policies\"\n").unwrap();

    warden(&temp)
        .args(["--config", path.to_str().unwrap(), "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom_policies"));
}

#[test]
fn invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("warden.toml"), "[cache]\ncapacity = 0\n").unwrap();

    warden(&temp)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("capacity"));
}

// ============================================================================
// Argument Parsing Errors (Missing Required Arguments)
// ============================================================================

#[test]
fn no_command_shows_help() {
    Command::cargo_bin("warden")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn validate_requires_path() {
    Command::cargo_bin("warden")
        .unwrap()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn check_requires_request() {
    Command::cargo_bin("warden")
        .unwrap()
        .args(["check", "--subject-id", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn filter_rejects_non_numeric_subject() {
    Command::cargo_bin("warden")
        .unwrap()
        .args(["filter", "--subject-id", "alice", "--action", "read_list", "--resource-type", "file"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn check_help_shows_options() {
    Command::cargo_bin("warden")
        .unwrap()
        .args(["check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--resource-id"))
        .stdout(predicate::str::contains("--explain"));
}
