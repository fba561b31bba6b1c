use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const REGISTRY: &str = r#"{
    "current_target": "draft-14",
    "implementations": {
        "x": { "name": "X", "organization": "o", "draft_versions": ["draft-14"],
               "roles": { "client": { "docker": { "image": "x-client" } } } },
        "y": { "name": "Y", "organization": "o", "draft_versions": ["draft-14"],
               "roles": { "relay": { "remote": [
                   { "url": "https://y.example:4443", "transport": "webtransport" },
                   { "url": "moqt://old.y.example:4443", "transport": "quic", "status": "inactive" }
               ] } } },
        "z": { "name": "Z", "organization": "o", "draft_versions": ["draft-13"],
               "roles": { "relay": { "remote": [{ "url": "moqt://z.example:4443", "transport": "quic" }] } } }
    }
}"#;

fn write_registry(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("implementations.json");
    std::fs::write(&path, body).unwrap();
    path
}

fn moq_interop(registry: &Path) -> Command {
    let mut cmd = Command::cargo_bin("moq-interop").unwrap();
    cmd.env_remove("MOQ_INTEROP_CONFIG").env_remove("RUST_LOG").arg("--registry").arg(registry);
    cmd
}

/// X/Y/Z scenario: only the pair sharing the target draft is planned.
#[test]
fn dry_run_json_plan() {
    let dir = TempDir::new().unwrap();
    let registry = write_registry(dir.path(), REGISTRY);

    let output = moq_interop(&registry)
        .args(["--dry-run", "--format", "json"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let plan: Value = serde_json::from_slice(&output.stdout).expect("Invalid JSON output");
    assert_eq!(plan["target_version"], "draft-14");
    let entries = plan["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["client"], "x");
    assert_eq!(entries[0]["relay"], "y");
    assert_eq!(entries[0]["classification"], "at");
    assert_eq!(entries[0]["target"], "https://y.example:4443");
    assert_eq!(entries[0]["mode"], "remote-webtransport");
}

#[test]
fn dry_run_table_and_target_override() {
    let dir = TempDir::new().unwrap();
    let registry = write_registry(dir.path(), REGISTRY);

    moq_interop(&registry)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 entries, target draft-14"));

    moq_interop(&registry)
        .args(["--dry-run", "--format", "json", "--target", "draft-15", "--only-behind"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"classification\": \"behind\""));
}

#[test]
fn list_registry() {
    let dir = TempDir::new().unwrap();
    let registry = write_registry(dir.path(), REGISTRY);

    moq_interop(&registry)
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("x-client"))
        .stdout(predicate::str::contains("moqt://old.y.example:4443"));
}

#[test]
fn conflicting_filters_exit_with_config_error() {
    let dir = TempDir::new().unwrap();
    let registry = write_registry(dir.path(), REGISTRY);

    moq_interop(&registry)
        .args(["--dry-run", "--only-at", "--only-ahead"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("only-at"));
}

#[test]
fn unknown_implementation_is_rejected() {
    let dir = TempDir::new().unwrap();
    let registry = write_registry(dir.path(), REGISTRY);

    moq_interop(&registry)
        .args(["--dry-run", "--relay", "nope"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn invalid_registry_lists_issues() {
    let dir = TempDir::new().unwrap();
    let registry = write_registry(
        dir.path(),
        r#"{ "current_target": "draft-14", "implementations": {
            "bad": { "name": "B", "organization": "o", "draft_versions": ["14"], "roles": {} } } }"#,
    );

    moq_interop(&registry)
        .arg("--dry-run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("implementations.bad.draft_versions[0]"));
}

#[test]
fn missing_registry_file() {
    let dir = TempDir::new().unwrap();
    moq_interop(&dir.path().join("absent.json")).arg("--list").assert().code(2);
}

#[test]
fn structural_registry_errors_are_all_listed() {
    let dir = TempDir::new().unwrap();
    let registry = write_registry(
        dir.path(),
        r#"{ "current_target": "draft-14", "implementations": {
            "a": { "name": "A", "organization": "o", "draft_versions": ["draft-x"],
                   "roles": { "relay": { "remote": [{ "url": "moqt://a.example:4443" }] } } },
            "b": { "name": "B", "organization": "o", "draft_versions": [14],
                   "roles": { "relay": { "docker": { "build": "./b" } } } } } }"#,
    );

    moq_interop(&registry)
        .arg("--dry-run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("implementations.a.draft_versions[0]"))
        .stderr(predicate::str::contains("implementations.a.roles.relay.remote[0].transport"))
        .stderr(predicate::str::contains("implementations.b.draft_versions[0]"))
        .stderr(predicate::str::contains("implementations.b.roles.relay.docker.image"));
}
