//! Server URL templating and base URL derivation.

use super::types::{Operation, RawSpec, Server, ServerVariable};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;
use url::Url;

static VARIABLE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{([^{}]+)\}").expect("server variable pattern is valid")
});

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Substitution for one server variable: its `default`, else its first
/// `enum` value.
fn variable_value(variable: &Value) -> Option<String> {
    variable
        .get("default")
        .and_then(scalar_string)
        .or_else(|| {
            variable
                .get("enum")
                .and_then(Value::as_array)
                .and_then(|e| e.first())
                .and_then(scalar_string)
        })
}

/// Substitute every `{variable}` in a server's URL template.
///
/// Variables without a default or enum stay as written. A server without a
/// `url` yields an empty string.
pub fn resolve_server_url(server: &Value) -> String {
    let Some(template) = server.get("url").and_then(Value::as_str) else {
        return String::new();
    };
    let variables = server.get("variables");
    VARIABLE
        .replace_all(template, |caps: &Captures| {
            variables
                .and_then(|vars| vars.get(&caps[1]))
                .and_then(variable_value)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Parse one server object.
pub fn parse_server(node: &Value) -> Option<Server> {
    let obj = node.as_object()?;
    let variables = obj
        .get("variables")
        .and_then(Value::as_object)
        .map(|vars| {
            vars.iter()
                .map(|(name, var)| ServerVariable {
                    name: name.clone(),
                    default: var.get("default").and_then(scalar_string),
                    enum_values: var
                        .get("enum")
                        .and_then(Value::as_array)
                        .map(|e| e.iter().filter_map(scalar_string).collect())
                        .unwrap_or_default(),
                    description: var
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    Some(Server {
        url_template: obj
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        url: resolve_server_url(node),
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        variables,
    })
}

/// Parse a `servers` array; anything else yields an empty list.
pub fn parse_servers(node: Option<&Value>) -> Vec<Server> {
    node.and_then(Value::as_array)
        .map(|servers| servers.iter().filter_map(parse_server).collect())
        .unwrap_or_default()
}

/// Document-level servers.
pub fn document_servers(spec: &RawSpec) -> Vec<Server> {
    parse_servers(spec.get("servers"))
}

/// Base URL for executing calls.
///
/// Uses the first document-level server. A relative server URL is resolved
/// against the origin of `spec_url`, the location the document was loaded
/// from. Without servers the origin of `spec_url` is used. Trailing slashes
/// are stripped; with neither source the result is empty.
pub fn resolve_base_url(spec: &RawSpec, spec_url: Option<&str>) -> String {
    let origin = spec_url.and_then(origin_of);
    let first = spec
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|servers| servers.first())
        .map(resolve_server_url);

    let base = match (first, origin) {
        (Some(server_url), None) => server_url,
        (Some(server_url), Some(_)) if is_absolute(&server_url) => server_url,
        (Some(server_url), Some(origin)) => match join_origin(&origin, &server_url) {
            Some(joined) => joined,
            None => {
                debug!(server_url, origin, "could not resolve relative server url");
                server_url
            }
        },
        (None, Some(origin)) => origin,
        (None, None) => String::new(),
    };
    base.trim_end_matches('/').to_string()
}

/// First effective server URL of an operation.
pub fn operation_server_url(operation: &Operation) -> Option<&str> {
    operation.servers.first().map(|s| s.url.as_str())
}

fn is_absolute(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|u| u.has_host())
        .unwrap_or(false)
}

fn origin_of(spec_url: &str) -> Option<String> {
    let parsed = Url::parse(spec_url).ok()?;
    let origin = parsed.origin();
    origin
        .is_tuple()
        .then(|| origin.ascii_serialization())
}

fn join_origin(origin: &str, relative: &str) -> Option<String> {
    let base = Url::parse(&format!("{origin}/")).ok()?;
    base.join(relative).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_variable_default() {
        let server = json!({
            "url": "https://{env}.example.com",
            "variables": {"env": {"default": "prod"}}
        });
        assert_eq!(resolve_server_url(&server), "https://prod.example.com");
    }

    #[test]
    fn test_server_variable_enum_and_unknown() {
        let server = json!({
            "url": "https://{region}.example.com:{port}/{missing}/{region}",
            "variables": {
                "region": {"enum": ["eu", "us"]},
                "port": {"default": 8443}
            }
        });
        assert_eq!(
            resolve_server_url(&server),
            "https://eu.example.com:8443/{missing}/eu"
        );
        assert_eq!(resolve_server_url(&json!({})), "");
    }

    #[test]
    fn test_parse_server_keeps_template() {
        let server = parse_server(&json!({
            "url": "https://{env}.example.com",
            "description": "main",
            "variables": {"env": {"default": "prod", "enum": ["prod", "staging"]}}
        }))
        .unwrap();
        assert_eq!(server.url_template, "https://{env}.example.com");
        assert_eq!(server.url, "https://prod.example.com");
        assert_eq!(server.variables[0].enum_values, vec!["prod", "staging"]);
    }

    #[test]
    fn test_base_url_absolute_server() {
        let spec = RawSpec::new(json!({"servers": [{"url": "https://api.example.com/v1/"}]}));
        assert_eq!(resolve_base_url(&spec, None), "https://api.example.com/v1");
        assert_eq!(
            resolve_base_url(&spec, Some("https://docs.example.org/openapi.json")),
            "https://api.example.com/v1"
        );
    }

    #[test]
    fn test_base_url_relative_server_uses_spec_origin() {
        let spec = RawSpec::new(json!({"servers": [{"url": "/api/v2/"}]}));
        assert_eq!(
            resolve_base_url(&spec, Some("http://localhost:3000/docs/openapi.json")),
            "http://localhost:3000/api/v2"
        );
        assert_eq!(resolve_base_url(&spec, None), "/api/v2");
    }

    #[test]
    fn test_base_url_without_servers() {
        let spec = RawSpec::new(json!({}));
        assert_eq!(
            resolve_base_url(&spec, Some("https://pets.example.com/openapi.json")),
            "https://pets.example.com"
        );
        assert_eq!(resolve_base_url(&spec, None), "");
    }
}
