//! Integration tests for the `opswatch` binary.

use assert_cmd::Command;
use predicates::prelude::*;

// ==================== Helper Functions ====================

fn opswatch() -> Command {
    let mut cmd = Command::cargo_bin("opswatch").unwrap();
    cmd.env_remove("OPSWATCH_API_URL")
        .env_remove("OPSWATCH_POLL_INTERVAL")
        .env("RUST_LOG", "off");
    cmd
}

// ==================== Argument Handling ====================

#[test]
fn test_help_lists_commands() {
    opswatch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("services"))
        .stdout(predicate::str::contains("alerts"))
        .stdout(predicate::str::contains("settings"));
}

#[test]
fn test_non_numeric_service_id_is_usage_error() {
    opswatch()
        .args(["services", "delete", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_invalid_api_url_is_reported() {
    opswatch()
        .args(["--api-url", "localhost:8080", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid base URL"));
}

#[test]
fn test_api_url_from_environment() {
    opswatch()
        .env("OPSWATCH_API_URL", "ftp://example.com")
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ftp://example.com"));
}

// ==================== Unreachable Server ====================

#[test]
fn test_status_against_unreachable_server_fails() {
    opswatch()
        .args(["--api-url", "http://127.0.0.1:9/api", "--timeout", "2", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error: transport error"));
}
