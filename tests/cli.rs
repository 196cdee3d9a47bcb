//! Binary-level tests for the `literesearch` command.

use assert_cmd::Command;
use predicates::prelude::*;

fn literesearch() -> Command {
    let mut cmd = Command::cargo_bin("literesearch").unwrap_or_else(|_| unreachable!());
    cmd.env_remove("OPENAI_API_KEY")
        .env_remove("TAVILY_API_KEY")
        .env_remove("RESEARCH_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    literesearch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("init-prompts"))
        .stdout(predicate::str::contains("report-types"));
}

#[test]
fn test_init_prompts_writes_templates() {
    let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
    literesearch()
        .arg("init-prompts")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 3 prompt template(s)"));
    assert!(dir.path().join("selector.md").exists());

    literesearch()
        .arg("init-prompts")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("already exist"));
}

#[test]
fn test_listings() {
    literesearch()
        .arg("tones")
        .assert()
        .success()
        .stdout(predicate::str::contains("objective"));
    literesearch()
        .args(["--format", "json", "report-types"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"detailed\""));
}

#[test]
fn test_run_without_api_key_fails() {
    literesearch()
        .args(["run", "solid-state batteries"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key missing"));
}

#[test]
fn test_run_rejects_unknown_report_type() {
    literesearch()
        .args(["run", "solid-state batteries", "-t", "essay"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"));
}
