//! CLI integration tests
//!
//! These tests drive the built binary against a scratch database and verify
//! that each subcommand delegates to the engine query surface.

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn v4_state(serial: u64, resources: Value) -> Value {
    json!({
        "version": 4,
        "terraform_version": "1.5.7",
        "serial": serial,
        "lineage": "prod/vpc",
        "outputs": {},
        "resources": resources,
    })
}

fn managed(resource_type: &str, name: &str, attributes: Value) -> Value {
    json!({
        "mode": "managed",
        "type": resource_type,
        "name": name,
        "instances": [{"schema_version": 0, "attributes": attributes}]
    })
}

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_vec(value).unwrap()).unwrap();
    path
}

fn run(temp_dir: &TempDir, args: &[&str]) -> Output {
    let db_path = temp_dir.path().join("store.db");
    Command::new(env!("CARGO_BIN_EXE_stateboard"))
        .current_dir(temp_dir.path())
        .env("RUST_LOG", "off")
        .arg("--db")
        .arg(&db_path)
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "CLI command should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Ingest v1 and v2 of prod/vpc with fixed version ids
fn seed(temp_dir: &TempDir) {
    let v1 = write_json(
        temp_dir.path(),
        "v1.tfstate",
        &v4_state(
            1,
            json!([managed("aws_vpc", "main", json!({"cidr_block": "10.0.0.0/16"}))]),
        ),
    );
    let v2 = write_json(
        temp_dir.path(),
        "v2.tfstate",
        &v4_state(
            2,
            json!([
                managed("aws_vpc", "main", json!({"cidr_block": "10.1.0.0/16"})),
                managed("aws_subnet", "a", json!({"cidr_block": "10.1.1.0/24"}))
            ]),
        ),
    );

    let out = stdout(&run(
        temp_dir,
        &["ingest", v1.to_str().unwrap(), "--version-id", "v1"],
    ));
    assert!(out.contains("Recorded prod/vpc serial 1 as v1"));
    stdout(&run(
        temp_dir,
        &["ingest", v2.to_str().unwrap(), "--version-id", "v2"],
    ));
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_ingest_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    seed(&temp_dir);

    let again = temp_dir.path().join("v1.tfstate");
    let out = stdout(&run(&temp_dir, &["ingest", again.to_str().unwrap()]));
    assert!(out.contains("Already recorded prod/vpc serial 1 as v1"));
}

#[test]
fn test_state_versions_and_default() {
    let temp_dir = TempDir::new().unwrap();
    seed(&temp_dir);

    let versions: Value =
        serde_json::from_str(&stdout(&run(&temp_dir, &["state", "versions", "prod/vpc"])))
            .unwrap();
    let ids: Vec<&str> = versions
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["version_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["v2", "v1"]);

    let default = stdout(&run(&temp_dir, &["state", "default", "prod/vpc"]));
    assert_eq!(default.trim(), "v2");
}

#[test]
fn test_state_compare_markdown_and_json() {
    let temp_dir = TempDir::new().unwrap();
    seed(&temp_dir);

    let markdown = stdout(&run(
        &temp_dir,
        &["state", "compare", "prod/vpc", "--from", "v1", "--to", "v2"],
    ));
    assert!(markdown.contains("## State Comparison"));
    assert!(markdown.contains("aws_subnet.a"));

    let structured: Value = serde_json::from_str(&stdout(&run(
        &temp_dir,
        &["state", "compare", "prod/vpc", "--from", "v1", "--json"],
    )))
    .unwrap();
    let entries = structured["comparison"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["kind"], "added");
    assert_eq!(entries[1]["kind"], "modified");
}

#[test]
fn test_state_get_unknown_lineage_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = run(&temp_dir, &["state", "get", "nowhere"]);

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("ERR_UNKNOWN_LINEAGE"));
}

#[test]
fn test_search_and_resources() {
    let temp_dir = TempDir::new().unwrap();
    seed(&temp_dir);

    let found: Value = serde_json::from_str(&stdout(&run(
        &temp_dir,
        &["search", "--key", "cidr_block", "--limit", "1", "--page", "2"],
    )))
    .unwrap();
    assert_eq!(found["total"], 2);
    assert_eq!(found["page"], 2);
    assert_eq!(found["results"].as_array().unwrap().len(), 1);

    let types: Value =
        serde_json::from_str(&stdout(&run(&temp_dir, &["resources", "types"]))).unwrap();
    assert_eq!(types.as_array().unwrap().len(), 2);

    let names: Value = serde_json::from_str(&stdout(&run(
        &temp_dir,
        &["resources", "names", "--type", "aws_vpc"],
    )))
    .unwrap();
    assert_eq!(names, json!(["main"]));

    let tool_versions: Value = serde_json::from_str(&stdout(&run(
        &temp_dir,
        &["tool-versions", "--order-by", "count"],
    )))
    .unwrap();
    assert_eq!(tool_versions[0]["tool_version"], "1.5.7");
}

#[test]
fn test_locks_from_lock_dir() {
    let temp_dir = TempDir::new().unwrap();
    let lock_dir = temp_dir.path().join("locks");
    fs::create_dir_all(&lock_dir).unwrap();
    write_json(
        &lock_dir,
        "prod.lock.json",
        &json!({
            "ID": "lock-1",
            "Operation": "OperationTypeApply",
            "Who": "ci@runner",
            "Created": "2024-06-01T09:00:00Z"
        }),
    );

    let report: Value = serde_json::from_str(&stdout(&run(
        &temp_dir,
        &["locks", "--lock-dir", lock_dir.to_str().unwrap()],
    )))
    .unwrap();
    assert_eq!(report["locks"]["prod"]["who"], "ci@runner");
    assert_eq!(report["providers_queried"], 1);
}

#[test]
fn test_explicit_missing_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = run(&temp_dir, &["--config", "absent.toml", "state", "lineages"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}
