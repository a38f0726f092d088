//! Documentation index.
//!
//! Groups operations by tag and lists component schemas the way a docs
//! sidebar presents them.

use crate::spec::{expand_schema, Operation, RawSpec, ResolvedSchema};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// A declared (or encountered) tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Operations listed under one tag.
#[derive(Debug, Clone, Serialize)]
pub struct TagGroup<'a> {
    pub tag: TagInfo,
    pub operations: Vec<&'a Operation>,
}

/// `info` block summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiInfo {
    pub title: String,
    pub version: String,
    pub description: String,
    pub openapi: String,
}

/// Tags declared at the document root, in declaration order.
pub fn tags(spec: &RawSpec) -> Vec<TagInfo> {
    spec.as_value()
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| {
                    let name = t.get("name")?.as_str()?.trim();
                    (!name.is_empty()).then(|| TagInfo {
                        name: name.to_string(),
                        description: t
                            .get("description")
                            .and_then(Value::as_str)
                            .map(String::from),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Group operations under every tag they carry.
///
/// Declared tags come first in declaration order, then tags only seen on
/// operations in the order they are first encountered. Empty groups are
/// omitted.
pub fn operations_by_tag<'a>(operations: &'a [Operation], spec: &RawSpec) -> Vec<TagGroup<'a>> {
    let mut groups: Vec<TagGroup<'a>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for tag in tags(spec) {
        if index.contains_key(&tag.name) {
            continue;
        }
        index.insert(tag.name.clone(), groups.len());
        groups.push(TagGroup {
            tag,
            operations: Vec::new(),
        });
    }
    for op in operations {
        for name in &op.tags {
            let slot = match index.get(name) {
                Some(&slot) => slot,
                None => {
                    index.insert(name.clone(), groups.len());
                    groups.push(TagGroup {
                        tag: TagInfo {
                            name: name.clone(),
                            description: None,
                        },
                        operations: Vec::new(),
                    });
                    groups.len() - 1
                }
            };
            groups[slot].operations.push(op);
        }
    }
    groups.retain(|g| !g.operations.is_empty());
    groups
}

/// Component schemas, expanded, in declaration order.
pub fn schemas(spec: &RawSpec) -> Vec<(String, ResolvedSchema)> {
    spec.as_value()
        .pointer("/components/schemas")
        .and_then(Value::as_object)
        .map(|schemas| {
            schemas
                .iter()
                .filter_map(|(name, schema)| {
                    expand_schema(spec, schema).map(|mut resolved| {
                        if resolved.metadata.ref_name.is_none() {
                            resolved.metadata.ref_name = Some(name.clone());
                        }
                        (name.clone(), resolved)
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn api_info(spec: &RawSpec) -> ApiInfo {
    let info = spec.as_value().get("info");
    let field = |key: &str| {
        info.and_then(|i| i.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    ApiInfo {
        title: field("title"),
        version: field("version"),
        description: field("description"),
        openapi: spec.openapi_version().unwrap_or_default().to_string(),
    }
}
