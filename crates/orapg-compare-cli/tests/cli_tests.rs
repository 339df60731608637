//! CLI integration tests for orapg-compare.
//!
//! These tests verify command-line argument parsing, help output, and exit
//! codes for error conditions that need no live database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the orapg-compare binary.
fn cmd() -> Command {
    Command::cargo_bin("orapg-compare").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("schemas"))
        .stdout(predicate::str::contains("query-diff"))
        .stdout(predicate::str::contains("sample"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_query_diff_subcommand_help() {
    cmd()
        .args(["query-diff", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--left-query"))
        .stdout(predicate::str::contains("--right-query"))
        .stdout(predicate::str::contains("--left-engine"))
        .stdout(predicate::str::contains("--mode"));
}

#[test]
fn test_sample_subcommand_help() {
    cmd()
        .args(["sample", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--rows"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("orapg-compare"));
}

// =============================================================================
// Configuration Error Tests
// =============================================================================

#[test]
fn test_missing_config_file_fails() {
    cmd()
        .args(["--config", "/nonexistent/config.yaml", "health-check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_config_missing_required_field_fails_with_config_exit_code() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    // oracle.dsn is missing.
    write!(
        file,
        "oracle:\n  user: scott\n  password: tiger\n\
         postgres:\n  host: localhost\n  database: d\n  user: u\n  password: p\n"
    )
    .unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("oracle.dsn"));
}

#[test]
fn test_schemas_without_tables_fails() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "oracle:\n  user: scott\n  password: tiger\n  dsn: \"db:1521/ORCL\"\n\
         postgres:\n  host: localhost\n  database: d\n  user: u\n  password: p\n"
    )
    .unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "schemas"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("compare.tables"));
}

#[test]
fn test_query_diff_requires_queries() {
    cmd()
        .args(["query-diff", "--left-query", "SELECT 1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--right-query"));
}
