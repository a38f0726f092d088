//! Unit tests for CLI commands

use crate::cli::{parse_key_value, select_operation, Cli, Commands, SourcesCommand};
use crate::spec::{collect_operations, RawSpec};
use clap::Parser;
use serde_json::json;

#[test]
fn test_call_command_with_params() {
    let cli = Cli::try_parse_from([
        "specdeck",
        "call",
        "getPetById",
        "--spec",
        "openapi.json",
        "-p",
        "petId=10",
        "-q",
        "tags=a",
        "-q",
        "tags=b",
        "-H",
        "api_key=secret",
        "--body",
        "{\"name\":\"Rex\"}",
    ])
    .unwrap();

    match cli.command {
        Commands::Call {
            spec,
            operation,
            path_params,
            query,
            headers,
            body,
            ..
        } => {
            assert_eq!(spec.spec.as_deref(), Some("openapi.json"));
            assert_eq!(operation, "getPetById");
            assert_eq!(path_params, vec![("petId".to_string(), "10".to_string())]);
            assert_eq!(query.len(), 2);
            assert_eq!(headers[0].0, "api_key");
            assert_eq!(body.as_deref(), Some("{\"name\":\"Rex\"}"));
        }
        _ => panic!("Expected Call command"),
    }
}

#[test]
fn test_example_requires_a_target() {
    assert!(Cli::try_parse_from(["specdeck", "example"]).is_err());
    assert!(
        Cli::try_parse_from(["specdeck", "example", "--schema", "Pet", "--operation", "addPet"])
            .is_err()
    );
    assert!(Cli::try_parse_from(["specdeck", "example", "--schema", "Pet"]).is_ok());
    assert!(Cli::try_parse_from(["specdeck", "example", "--response", "200"]).is_err());
}

#[test]
fn test_sources_subcommands() {
    let cli = Cli::try_parse_from(["specdeck", "sources", "proxy", "pets-abcde", "--off"]).unwrap();
    match cli.command {
        Commands::Sources {
            command: SourcesCommand::Proxy { id, off },
        } => {
            assert_eq!(id, "pets-abcde");
            assert!(off);
        }
        _ => panic!("Expected sources proxy command"),
    }

    let cli = Cli::try_parse_from(["specdeck", "sources", "add", "https://x/openapi.json"]).unwrap();
    match cli.command {
        Commands::Sources {
            command: SourcesCommand::Add { url, name, proxy },
        } => {
            assert_eq!(url, "https://x/openapi.json");
            assert_eq!(name, "");
            assert!(!proxy);
        }
        _ => panic!("Expected sources add command"),
    }
}

#[test]
fn test_all_commands_parse() {
    let commands = vec![
        vec!["specdeck", "inspect"],
        vec!["specdeck", "inspect", "--spec", "x.yaml", "--json"],
        vec!["specdeck", "tags", "-s", "x.yaml", "--via-proxy"],
        vec!["specdeck", "show", "GET /pets"],
        vec!["specdeck", "proxy", "--addr", "127.0.0.1:0", "--workers", "2"],
        vec!["specdeck", "sources", "list"],
        vec!["specdeck", "sources", "remove", "default"],
        vec!["specdeck", "sources", "use", "default"],
    ];

    for args in commands {
        let cli = Cli::try_parse_from(&args);
        assert!(cli.is_ok(), "Failed to parse command: {:?}", args);
    }
}

#[test]
fn test_parse_key_value() {
    assert_eq!(
        parse_key_value("filter=a=b").unwrap(),
        ("filter".to_string(), "a=b".to_string())
    );
    assert_eq!(parse_key_value("empty=").unwrap().1, "");
    assert!(parse_key_value("novalue").is_err());
    assert!(parse_key_value("=x").is_err());
}

#[test]
fn test_select_operation_by_id_or_route() {
    let spec = RawSpec::new(json!({
        "openapi": "3.0.3",
        "paths": {
            "/pets/{id}": {
                "get": {"operationId": "getPet"},
                "delete": {}
            }
        }
    }));
    let operations = collect_operations(&spec);
    assert_eq!(select_operation(&operations, "getPet").unwrap().path, "/pets/{id}");
    let deleted = select_operation(&operations, "delete  /pets/{id}").unwrap();
    assert_eq!(deleted.operation_id, "delete-pets-id");
    assert!(select_operation(&operations, "POST /pets/{id}").is_none());
    assert!(select_operation(&operations, "nothing").is_none());
}
