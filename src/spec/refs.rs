//! Local `$ref` resolution.
//!
//! Only in-document references (`#/...`) are followed. Anything else resolves
//! to `None` so callers can degrade instead of failing.

use super::types::RawSpec;
use serde_json::Value;
use tracing::debug;

/// Upper bound on `$ref` → `$ref` hops when chasing non-schema objects.
const MAX_REF_HOPS: usize = 32;

/// Resolve a local reference such as `#/components/schemas/Pet`.
///
/// Segments are JSON-pointer decoded (`~1` → `/`, `~0` → `~`, then
/// percent-decoded). Numeric segments index into arrays. Returns `None` for
/// non-local references, missing segments, or a `null` target.
pub fn resolve_reference<'a>(spec: &'a RawSpec, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix("#/")?;
    let mut current = spec.as_value();
    for raw in pointer.split('/') {
        let segment = decode_pointer_segment(raw);
        current = match current {
            Value::Object(map) => map.get(segment.as_str())?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        return None;
    }
    Some(current)
}

/// The `$ref` string of a node, if it is a reference object.
pub fn ref_of(node: &Value) -> Option<&str> {
    node.get("$ref").and_then(Value::as_str)
}

/// Follow a chain of reference objects to the first non-reference node.
///
/// Used for parameters, request bodies, responses, headers and examples.
/// Gives up (returns `None`) on dangling references or when the chain loops.
pub fn deref<'a>(spec: &'a RawSpec, node: &'a Value) -> Option<&'a Value> {
    let mut current = node;
    let mut seen: Vec<&str> = Vec::new();
    for _ in 0..MAX_REF_HOPS {
        let Some(reference) = ref_of(current) else {
            return Some(current);
        };
        if seen.contains(&reference) {
            debug!(reference, "reference chain loops back on itself");
            return None;
        }
        seen.push(reference);
        current = match resolve_reference(spec, reference) {
            Some(target) => target,
            None => {
                debug!(reference, "unresolved reference");
                return None;
            }
        };
    }
    None
}

/// Component name for `#/components/{section}/{name}` references.
pub fn component_name(reference: &str, section: &str) -> Option<String> {
    let rest = reference.strip_prefix("#/components/")?;
    let (sec, name) = rest.split_once('/')?;
    if sec != section || name.is_empty() || name.contains('/') {
        return None;
    }
    Some(decode_pointer_segment(name))
}

fn decode_pointer_segment(segment: &str) -> String {
    let unescaped = segment.replace("~1", "/").replace("~0", "~");
    match urlencoding::decode(&unescaped) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => unescaped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> RawSpec {
        RawSpec::new(json!({
            "components": {
                "schemas": {
                    "Pet": {"type": "object"},
                    "Alias": {"$ref": "#/components/schemas/Pet"},
                    "a/b": {"type": "string"},
                    "Loop": {"$ref": "#/components/schemas/Loop"}
                },
                "parameters": {
                    "Limit": {"name": "limit", "in": "query"}
                }
            },
            "servers": [{"url": "https://one"}, {"url": "https://two"}]
        }))
    }

    #[test]
    fn test_resolve_local_reference() {
        let spec = doc();
        assert_eq!(
            resolve_reference(&spec, "#/components/schemas/Pet"),
            Some(&json!({"type": "object"}))
        );
    }

    #[test]
    fn test_resolve_missing_or_external() {
        let spec = doc();
        assert!(resolve_reference(&spec, "#/components/schemas/Nope").is_none());
        assert!(resolve_reference(&spec, "other.yaml#/components/schemas/Pet").is_none());
        assert!(resolve_reference(&spec, "components/schemas/Pet").is_none());
    }

    #[test]
    fn test_resolve_escaped_and_indexed_segments() {
        let spec = doc();
        assert_eq!(
            resolve_reference(&spec, "#/components/schemas/a~1b"),
            Some(&json!({"type": "string"}))
        );
        assert_eq!(
            resolve_reference(&spec, "#/servers/1/url"),
            Some(&json!("https://two"))
        );
    }

    #[test]
    fn test_deref_chases_chains() {
        let spec = doc();
        let node = json!({"$ref": "#/components/schemas/Alias"});
        assert_eq!(deref(&spec, &node), Some(&json!({"type": "object"})));
    }

    #[test]
    fn test_deref_stops_on_loop() {
        let spec = doc();
        let node = json!({"$ref": "#/components/schemas/Loop"});
        assert!(deref(&spec, &node).is_none());
    }

    #[test]
    fn test_component_name() {
        assert_eq!(
            component_name("#/components/schemas/User", "schemas"),
            Some("User".to_string())
        );
        assert!(component_name("#/components/responses/User", "schemas").is_none());
        assert!(component_name("#/definitions/User", "schemas").is_none());
    }
}
