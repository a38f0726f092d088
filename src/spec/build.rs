//! Operation collection.
//!
//! Walks `paths` and turns every method entry into a normalized [`Operation`]:
//! parameters, request body, responses, servers and declared security, all
//! with references resolved.

use super::refs::deref;
use super::schema::{expand_optional, ResolvedSchema};
use super::servers::parse_servers;
use super::types::{
    DeclaredSecurity, Example, Header, HttpMethod, MediaContent, Operation, Parameter,
    ParameterLocation, ParameterStyle, RawSpec, RequestBody, Response, Server, UNTAGGED,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::{debug, warn};

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[^A-Za-z0-9]+").expect("operationId pattern is valid")
});

/// Deterministic operationId for operations that do not declare one.
///
/// `{method}-{segments}` where each path segment has its braces removed and
/// every run of non-alphanumeric characters collapsed into one hyphen.
/// A path with no usable segments becomes `root`.
///
/// ```
/// use specdeck::spec::{derive_operation_id, HttpMethod};
/// assert_eq!(derive_operation_id(HttpMethod::Get, "/pets/{id}"), "get-pets-id");
/// assert_eq!(derive_operation_id(HttpMethod::Post, "/"), "post-root");
/// ```
pub fn derive_operation_id(method: HttpMethod, path: &str) -> String {
    let stripped = path.replace(['{', '}'], "");
    let segments: Vec<String> = stripped
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| NON_ALNUM.replace_all(s, "-").into_owned())
        .filter(|s| !s.is_empty())
        .collect();
    let normalized = if segments.is_empty() {
        "root".to_string()
    } else {
        segments.join("-")
    };
    format!("{}-{}", method.as_lower(), normalized)
}

/// Collect every operation in the document.
///
/// Sorted by path, then by method priority (get, post, put, patch, delete,
/// head, options, trace). Malformed path items are skipped.
pub fn collect_operations(spec: &RawSpec) -> Vec<Operation> {
    let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
        debug!("document has no paths");
        return Vec::new();
    };
    let document_servers = parse_servers(spec.get("servers"));

    let mut operations = Vec::new();
    for (path, raw_item) in paths {
        let Some(item) = merge_path_item(spec, raw_item) else {
            debug!(path, "skipping malformed path item");
            continue;
        };
        let item_servers = parse_servers(item.get("servers"));
        for (key, raw_op) in item.iter() {
            let Some(method) = HttpMethod::parse(key) else {
                continue;
            };
            let Some(op) = raw_op.as_object() else {
                debug!(path, method = %method, "skipping non-object operation");
                continue;
            };
            operations.push(build_operation(
                spec,
                path,
                method,
                &item,
                op,
                &item_servers,
                &document_servers,
            ));
        }
    }
    operations.sort_by(|a, b| a.key().cmp(&b.key()));
    operations
}

/// A path item with its `$ref` target merged under the local keys.
fn merge_path_item<'a>(spec: &'a RawSpec, item: &'a Value) -> Option<Cow<'a, Map<String, Value>>> {
    let local = item.as_object()?;
    if !local.contains_key("$ref") {
        return Some(Cow::Borrowed(local));
    }
    let mut merged = deref(spec, item)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    for (k, v) in local {
        if k != "$ref" {
            merged.insert(k.clone(), v.clone());
        }
    }
    Some(Cow::Owned(merged))
}

fn build_operation(
    spec: &RawSpec,
    path: &str,
    method: HttpMethod,
    item: &Map<String, Value>,
    op: &Map<String, Value>,
    item_servers: &[Server],
    document_servers: &[Server],
) -> Operation {
    let declared_id = op
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty());
    let (operation_id, operation_id_derived) = match declared_id {
        Some(id) => (id.to_string(), false),
        None => (derive_operation_id(method, path), true),
    };

    let mut tags: Vec<String> = op
        .get("tags")
        .and_then(Value::as_array)
        .map(|t| t.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();
    if tags.is_empty() {
        tags.push(UNTAGGED.to_string());
    }

    let mut parameters = extract_parameters(spec, item.get("parameters"));
    parameters.extend(extract_parameters(spec, op.get("parameters")));

    let op_servers = parse_servers(op.get("servers"));
    let servers = if !op_servers.is_empty() {
        op_servers
    } else if !item_servers.is_empty() {
        item_servers.to_vec()
    } else {
        document_servers.to_vec()
    };

    Operation {
        path: path.to_string(),
        method,
        operation_id,
        operation_id_derived,
        summary: string_field(op, "summary"),
        description: string_field(op, "description"),
        tags,
        deprecated: bool_field(op, "deprecated"),
        parameters,
        request_body: op
            .get("requestBody")
            .and_then(|body| extract_request_body(spec, body)),
        responses: extract_responses(spec, op.get("responses")),
        servers,
        security: declared_security(op.get("security")),
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// `security` as declared; a non-array value counts as absent.
pub(crate) fn declared_security(node: Option<&Value>) -> DeclaredSecurity {
    node.and_then(Value::as_array).map(|reqs| {
        reqs.iter()
            .filter_map(Value::as_object)
            .cloned()
            .collect()
    })
}

/// Resolve and normalize a `parameters` array.
///
/// Entries without a name or a recognised `in` are dropped.
pub fn extract_parameters(spec: &RawSpec, node: Option<&Value>) -> Vec<Parameter> {
    let Some(params) = node.and_then(Value::as_array) else {
        return Vec::new();
    };
    params
        .iter()
        .filter_map(|p| {
            let resolved = deref(spec, p)?;
            let param = extract_parameter(spec, resolved);
            if param.is_none() {
                debug!(parameter = %resolved, "dropping malformed parameter");
            }
            param
        })
        .collect()
}

fn extract_parameter(spec: &RawSpec, node: &Value) -> Option<Parameter> {
    let obj = node.as_object()?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())?;
    let location = obj
        .get("in")
        .and_then(Value::as_str)
        .and_then(ParameterLocation::parse)?;

    // `content` is the alternative to `schema` for complex parameters.
    let schema_node = obj.get("schema").or_else(|| {
        obj.get("content")
            .and_then(Value::as_object)
            .and_then(|c| c.values().next())
            .and_then(|media| media.get("schema"))
    });
    let schema = expand_optional(spec, schema_node);
    let examples = collect_examples(spec, obj, schema.as_ref());

    Some(Parameter {
        name: name.to_string(),
        location,
        required: bool_field(obj, "required"),
        description: string_field(obj, "description"),
        deprecated: bool_field(obj, "deprecated"),
        style: obj
            .get("style")
            .and_then(Value::as_str)
            .and_then(ParameterStyle::parse),
        explode: obj.get("explode").and_then(Value::as_bool),
        schema,
        examples,
    })
}

/// Examples in precedence order: the single `example`, then the named
/// `examples` map in declaration order, then examples declared on the schema.
/// `null` values are skipped.
fn collect_examples(
    spec: &RawSpec,
    obj: &Map<String, Value>,
    schema: Option<&ResolvedSchema>,
) -> Vec<Example> {
    let mut out = Vec::new();
    if let Some(value) = obj.get("example").filter(|v| !v.is_null()) {
        out.push(Example::unnamed(value.clone()));
    }
    if let Some(named) = obj.get("examples").and_then(Value::as_object) {
        for (name, raw) in named {
            let Some(example) = deref(spec, raw) else {
                continue;
            };
            let Some(value) = example.get("value").filter(|v| !v.is_null()) else {
                continue;
            };
            out.push(Example {
                name: Some(name.clone()),
                summary: example
                    .get("summary")
                    .and_then(Value::as_str)
                    .map(String::from),
                value: value.clone(),
            });
        }
    }
    if let Some(schema) = schema {
        let meta = &schema.metadata;
        let schema_level = meta
            .examples
            .iter()
            .flatten()
            .chain(meta.example.iter())
            .filter(|v| !v.is_null());
        out.extend(schema_level.cloned().map(Example::unnamed));
    }
    out
}

/// `content` map → ordered media entries.
pub fn extract_content(spec: &RawSpec, node: Option<&Value>) -> Vec<MediaContent> {
    let Some(content) = node.and_then(Value::as_object) else {
        return Vec::new();
    };
    content
        .iter()
        .map(|(media_type, media)| {
            let schema = expand_optional(spec, media.get("schema"));
            let examples = match media.as_object() {
                Some(obj) => collect_examples(spec, obj, schema.as_ref()),
                None => Vec::new(),
            };
            MediaContent {
                media_type: media_type.clone(),
                schema,
                examples,
            }
        })
        .collect()
}

pub fn extract_request_body(spec: &RawSpec, node: &Value) -> Option<RequestBody> {
    let body = deref(spec, node)?.as_object()?;
    Some(RequestBody {
        description: string_field(body, "description"),
        required: bool_field(body, "required"),
        content: extract_content(spec, body.get("content")),
    })
}

/// Responses in declaration order, keyed by their status string.
pub fn extract_responses(spec: &RawSpec, node: Option<&Value>) -> Vec<Response> {
    let Some(responses) = node.and_then(Value::as_object) else {
        return Vec::new();
    };
    responses
        .iter()
        .filter_map(|(status, raw)| {
            let Some(resp) = deref(spec, raw).and_then(Value::as_object) else {
                warn!(status, "unresolvable response entry");
                return None;
            };
            Some(Response {
                status: status.clone(),
                description: string_field(resp, "description"),
                headers: extract_headers(spec, resp.get("headers")),
                content: extract_content(spec, resp.get("content")),
            })
        })
        .collect()
}

fn extract_headers(spec: &RawSpec, node: Option<&Value>) -> Vec<Header> {
    let Some(headers) = node.and_then(Value::as_object) else {
        return Vec::new();
    };
    headers
        .iter()
        .filter_map(|(name, raw)| {
            let header = deref(spec, raw)?.as_object()?;
            Some(Header {
                name: name.clone(),
                description: string_field(header, "description"),
                required: bool_field(header, "required"),
                schema: expand_optional(spec, header.get("schema")),
            })
        })
        .collect()
}

/// Operation with the given path and method.
pub fn find_operation<'a>(
    operations: &'a [Operation],
    path: &str,
    method: HttpMethod,
) -> Option<&'a Operation> {
    operations
        .iter()
        .find(|op| op.path == path && op.method == method)
}

/// First operation with the given operationId.
pub fn operation_by_id<'a>(operations: &'a [Operation], id: &str) -> Option<&'a Operation> {
    operations.iter().find(|op| op.operation_id == id)
}
