//! Integration tests for the shelf CLI.
//!
//! These run the real binary without a database, covering argument parsing,
//! input validation and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a command for the shelf binary with no database configured
fn shelf() -> Command {
    let mut cmd = Command::cargo_bin("shelf").unwrap();
    cmd.env_remove("DATABASE_URL").env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays() {
    shelf()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Shelf book catalog CLI"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("recompute"))
        .stdout(predicate::str::contains("similar"))
        .stdout(predicate::str::contains("genres"))
        .stdout(predicate::str::contains("import"));
}

#[test]
fn test_help_lists_exit_codes() {
    shelf()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("75"));
}

#[test]
fn test_version_displays() {
    shelf()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shelf"));
}

#[test]
fn test_search_help() {
    shelf()
        .args(["search", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--published-on"))
        .stdout(predicate::str::contains("--sort-title"));
}

#[test]
fn test_recompute_help() {
    shelf()
        .args(["recompute", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--timeout-secs"));
}

// ============================================================================
// Argument Errors
// ============================================================================

#[test]
fn test_no_subcommand_fails() {
    shelf().assert().failure();
}

#[test]
fn test_similar_requires_numeric_id() {
    shelf()
        .args(["similar", "dune"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

// ============================================================================
// Exit Codes
// ============================================================================

#[test]
fn test_bad_date_is_data_error() {
    shelf()
        .args(["search", "--published-on", "not-a-date"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("published_on"));
}

#[test]
fn test_bad_isbn_is_data_error() {
    shelf()
        .args(["import", "12345"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("isbn"));
}

#[test]
fn test_missing_database_url_is_usage_error() {
    shelf()
        .args(["search", "--genre", "Fantasy"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("DATABASE_URL"));
}

#[test]
fn test_recompute_without_database_is_usage_error() {
    shelf()
        .arg("recompute")
        .assert()
        .code(64)
        .stderr(predicate::str::contains("DATABASE_URL"));
}

#[test]
fn test_genres_without_database_is_usage_error() {
    shelf()
        .args(["genres", "Fantasy"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("DATABASE_URL"));
}
