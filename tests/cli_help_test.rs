// Binary smoke tests: help output, decomposition and job file validation

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("feature-orchestrator").unwrap();
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn test_no_subcommand_shows_getting_started() {
    bin()
        .assert()
        .success()
        .stdout(predicate::str::contains("Feature Orchestrator"))
        .stdout(predicate::str::contains("feature-orchestrator decompose"))
        .stdout(predicate::str::contains("feature-orchestrator run --jobs"));
}

#[test]
fn test_help_lists_subcommands() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("decompose"))
        .stdout(predicate::str::contains("hooks"));
}

#[test]
fn test_decompose_prints_json_tree() {
    let output = bin()
        .args(["decompose", "security.2", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let tree: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(tree["job_id"], "security.2");
    assert_eq!(tree["tasks"].as_array().unwrap().len(), 4);
    assert_eq!(tree["tasks"][3]["type"], "testing");
}

#[test]
fn test_decompose_rejects_bad_hint() {
    bin()
        .args(["decompose", "backend.1", "--complexity", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("outside 1..=5"));
}

#[test]
fn test_run_rejects_unknown_strategy() {
    let mut jobs = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(jobs, "[[jobs]]\nid = \"backend.1\"").unwrap();

    bin()
        .args(["run", "--jobs"])
        .arg(jobs.path())
        .args(["--strategy", "random"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown strategy"));
}

#[test]
fn test_hooks_lists_every_lifecycle_point() {
    bin()
        .arg("hooks")
        .assert()
        .success()
        .stdout(predicate::str::contains("pre-agent-assign"))
        .stdout(predicate::str::contains("on-complete"));
}
