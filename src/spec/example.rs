//! Example payload synthesis.
//!
//! Picks the most specific example a schema offers and otherwise builds a
//! placeholder value from its type, so every operation can show a body.

use super::schema::{expand_schema, ResolvedSchema, SchemaKind};
use super::types::RawSpec;
use serde_json::{Map, Value};

/// Placeholder for string leaves without any explicit example.
pub const STRING_PLACEHOLDER: &str = "string";

/// Build an example value for a resolved schema.
///
/// Precedence: `examples[0]`, `example`, `default`, `enum[0]`, then the first
/// `oneOf`/`anyOf`/`allOf` alternative, then a value synthesized from the
/// type. A JSON `null` in any explicit slot is skipped.
pub fn schema_example(schema: &ResolvedSchema) -> Value {
    let meta = &schema.metadata;
    let explicit = [
        meta.examples.as_ref().and_then(|e| e.first()),
        meta.example.as_ref(),
        meta.default.as_ref(),
        meta.enum_values.as_ref().and_then(|e| e.first()),
    ];
    if let Some(value) = explicit.into_iter().flatten().find(|v| !v.is_null()) {
        return value.clone();
    }

    match &schema.kind {
        SchemaKind::Composite(comp) => comp.first().map(schema_example).unwrap_or(Value::Null),
        SchemaKind::Object { properties } => Value::Object(
            properties
                .iter()
                .map(|(name, prop)| (name.clone(), schema_example(prop)))
                .collect::<Map<_, _>>(),
        ),
        SchemaKind::Array { items } => match items.as_deref().map(schema_example) {
            Some(item) if !item.is_null() => Value::Array(vec![item]),
            _ => Value::Array(Vec::new()),
        },
        SchemaKind::Recursive { .. } | SchemaKind::Unresolved { .. } => Value::Null,
        SchemaKind::Scalar => match meta.primary_type() {
            Some("boolean") => Value::Bool(false),
            Some("integer") | Some("number") => Value::from(0),
            Some("string") => Value::String(STRING_PLACEHOLDER.to_string()),
            Some("object") => Value::Object(Map::new()),
            Some("array") => Value::Array(Vec::new()),
            _ => Value::Null,
        },
    }
}

/// Expand a raw schema node and build its example; `Null` when the node
/// does not resolve.
pub fn example_for(spec: &RawSpec, schema: &Value) -> Value {
    expand_schema(spec, schema)
        .map(|resolved| schema_example(&resolved))
        .unwrap_or(Value::Null)
}
