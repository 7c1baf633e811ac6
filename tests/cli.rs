//! CLI smoke tests: argument validation and exit-code mapping.
//!
//! These run the real binary but never reach the network: every case fails
//! validation or credential checks first.

use assert_cmd::Command;
use predicates::prelude::*;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("govreporter").unwrap_or_else(|_| unreachable!());
    // Make sure ambient credentials never leak into the assertions.
    cmd.env_remove("OPENAI_API_KEY")
        .env_remove("COURT_LISTENER_API_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("server"))
        .stdout(predicate::str::contains("query"));
}

#[test]
fn invalid_date_exits_2() {
    bin()
        .args([
            "ingest",
            "opinions",
            "--start-date",
            "January 1",
            "--end-date",
            "2024-01-31",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid date"));
}

#[test]
fn reversed_date_range_exits_2() {
    bin()
        .args([
            "ingest",
            "orders",
            "--start-date",
            "2024-06-01",
            "--end-date",
            "2024-01-01",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid date range"));
}

#[test]
fn missing_credentials_exit_2() {
    bin()
        .args([
            "ingest",
            "orders",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-01-31",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn delete_requires_target_exits_1() {
    bin()
        .arg("delete")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--collection"));
}

#[test]
fn empty_query_exits_1() {
    bin().args(["query", "   "]).assert().code(1);
}

#[test]
fn unknown_sample_type_exits_1() {
    bin()
        .args(["info", "sample", "statutes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown document type"));
}
