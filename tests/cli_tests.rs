#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::fixtures::{petstore, titled, write_spec};
use common::mock_server::{MockResponse, MockServer};
use std::path::Path;
use std::process::{Command, Output};

fn specdeck(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_specdeck"))
        .current_dir(dir)
        .env("SPECDECK_SOURCES_FILE", dir.join("sources.json"))
        .env("OPENAPI_LOCATION", dir.join("petstore.json"))
        .env("SPECDECK_LOG_LEVEL", "warn")
        .args(args)
        .output()
        .expect("run cli")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn setup() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_spec(dir.path(), "petstore.json", &petstore().to_string());
    dir
}

#[test]
fn test_inspect_lists_operations() {
    let dir = setup();
    let output = specdeck(dir.path(), &["inspect", "--spec", "petstore.json"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("Pet Store 1.0.0 (OpenAPI 3.0.3)"));
    assert!(text.contains("server: https://api.petstore.test/v1/"));
    assert!(text.contains("getPetById"));
    assert!(text.contains("delete-pets-petId"));
}

#[test]
fn test_inspect_defaults_to_active_source() {
    let dir = setup();
    let output = specdeck(dir.path(), &["inspect", "--json"]);
    assert!(output.status.success());
    let ops: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(ops.as_array().unwrap().len(), 5);
    assert_eq!(ops[0]["operationId"], "health");
}

#[test]
fn test_example_and_show() {
    let dir = setup();
    let output = specdeck(dir.path(), &["example", "--schema", "Error"]);
    assert!(output.status.success());
    let example: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(example, serde_json::json!({"code": 0, "message": "string"}));

    let output = specdeck(dir.path(), &["show", "DELETE /pets/{petId}"]);
    assert!(output.status.success());
    let op: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(op["operationId"], "delete-pets-petId");
    assert_eq!(op["security"], serde_json::json!([{"schemes": []}]));

    let output = specdeck(dir.path(), &["show", "nope"]);
    assert!(!output.status.success());
}

#[test]
fn test_call_against_live_server() {
    let dir = setup();
    let server = MockServer::start(|_| MockResponse::text(200, "ok"));
    let output = specdeck(dir.path(), &["call", "health", "--base-url", &server.base_url()]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "ok");
    assert_eq!(server.requests()[0].url, "/health");
}

#[test]
fn test_sources_add_list_use() {
    let dir = setup();
    write_spec(dir.path(), "beta.json", &titled("Beta"));

    let output = specdeck(dir.path(), &["sources", "add", "beta.json"]);
    assert!(output.status.success());
    let id = stdout(&output).trim().to_string();
    assert!(id.starts_with("beta-"));

    let output = specdeck(dir.path(), &["sources", "list"]);
    let text = stdout(&output);
    let active: Vec<&str> = text.lines().filter(|l| l.starts_with('*')).collect();
    assert_eq!(active.len(), 1);
    assert!(active[0].contains(&id));
    assert!(text.contains("Pet Store"));

    let output = specdeck(dir.path(), &["sources", "use", "default"]);
    assert!(output.status.success());
    let output = specdeck(dir.path(), &["sources", "list"]);
    assert!(stdout(&output)
        .lines()
        .any(|l| l.starts_with('*') && l.contains("default")));

    let output = specdeck(dir.path(), &["sources", "remove", "missing-id"]);
    assert!(!output.status.success());
}
