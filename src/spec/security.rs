//! Security requirement resolution.
//!
//! Requirements are surfaced for display and never enforced.

use super::build::declared_security;
use super::refs::deref;
use super::types::{
    Operation, RawSpec, SecurityRequirement, SecurityScheme, SecuritySchemeKind,
    SecuritySchemeRef,
};
use serde_json::{Map, Value};
use tracing::debug;

fn parse_scheme(name: &str, node: &Value) -> Option<SecurityScheme> {
    let obj = node.as_object()?;
    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let declared = text("type");
    let kind = match declared.as_str() {
        "apiKey" => SecuritySchemeKind::ApiKey {
            name: text("name"),
            location: text("in"),
        },
        "http" => SecuritySchemeKind::Http {
            scheme: text("scheme"),
            bearer_format: obj
                .get("bearerFormat")
                .and_then(Value::as_str)
                .map(String::from),
        },
        "oauth2" => SecuritySchemeKind::OAuth2 {
            flows: obj.get("flows").cloned().unwrap_or(Value::Null),
        },
        "openIdConnect" => SecuritySchemeKind::OpenIdConnect {
            url: text("openIdConnectUrl"),
        },
        "mutualTLS" => SecuritySchemeKind::MutualTls,
        _ => SecuritySchemeKind::Other { declared },
    };
    Some(SecurityScheme {
        name: name.to_string(),
        description: text("description"),
        kind,
    })
}

/// Declared `components.securitySchemes`, in declaration order.
pub fn security_schemes(spec: &RawSpec) -> Vec<SecurityScheme> {
    spec.as_value()
        .pointer("/components/securitySchemes")
        .and_then(Value::as_object)
        .map(|schemes| {
            schemes
                .iter()
                .filter_map(|(name, raw)| parse_scheme(name, deref(spec, raw)?))
                .collect()
        })
        .unwrap_or_default()
}

fn scheme_by_name(spec: &RawSpec, name: &str) -> Option<SecurityScheme> {
    let raw = spec
        .as_value()
        .pointer("/components/securitySchemes")
        .and_then(|schemes| schemes.get(name))?;
    parse_scheme(name, deref(spec, raw)?)
}

fn to_requirement(spec: &RawSpec, declared: &Map<String, Value>) -> SecurityRequirement {
    let schemes = declared
        .iter()
        .map(|(name, scopes)| {
            let scheme = scheme_by_name(spec, name);
            if scheme.is_none() {
                debug!(scheme = %name, "security requirement names an undeclared scheme");
            }
            SecuritySchemeRef {
                name: name.clone(),
                scopes: scopes
                    .as_array()
                    .map(|s| s.iter().filter_map(Value::as_str).map(String::from).collect())
                    .unwrap_or_default(),
                scheme,
            }
        })
        .collect();
    SecurityRequirement { schemes }
}

/// Effective security requirements of an operation.
///
/// Operation-level `security` wins over the document default; neither yields
/// an empty list. A declared but empty array produces a single requirement
/// with no schemes, meaning authentication is optional.
pub fn resolve_security_requirements(
    spec: &RawSpec,
    operation: &Operation,
) -> Vec<SecurityRequirement> {
    let declared = operation
        .security
        .clone()
        .or_else(|| declared_security(spec.get("security")));
    match declared {
        None => Vec::new(),
        Some(reqs) if reqs.is_empty() => vec![SecurityRequirement::default()],
        Some(reqs) => reqs.iter().map(|r| to_requirement(spec, r)).collect(),
    }
}
