//! Schema expansion.
//!
//! Turns a raw schema node (possibly a `$ref`, possibly composed with
//! `oneOf`/`anyOf`/`allOf`) into a [`ResolvedSchema`] tree with every local
//! reference replaced by its target.
//!
//! Reference graphs are expected to be acyclic, but documents in the wild are
//! not always well behaved. The references on the active recursion path are
//! tracked and a revisit produces [`SchemaKind::Recursive`] instead of
//! recursing again, so expansion always terminates.

use super::refs::{component_name, ref_of, resolve_reference};
use super::types::RawSpec;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

const RECURSIVE_MARKER: &str = "x-recursive-ref";
const UNRESOLVED_MARKER: &str = "x-unresolved-ref";
const REF_NAME: &str = "x-ref-name";

/// Structural shape of a resolved schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// Properties in declaration order.
    Object {
        properties: Vec<(String, ResolvedSchema)>,
    },
    Array {
        items: Option<Box<ResolvedSchema>>,
    },
    Composite(Composition),
    Scalar,
    /// The reference is already being expanded further up the tree.
    Recursive { reference: String },
    /// A nested reference that points nowhere in the document.
    Unresolved { reference: String },
}

/// Composition keywords. Each is `None` when the keyword is absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Composition {
    pub one_of: Option<Vec<ResolvedSchema>>,
    pub any_of: Option<Vec<ResolvedSchema>>,
    pub all_of: Option<Vec<ResolvedSchema>>,
}

impl Composition {
    /// First alternative, looking at `oneOf`, then `anyOf`, then `allOf`.
    pub fn first(&self) -> Option<&ResolvedSchema> {
        [&self.one_of, &self.any_of, &self.all_of]
            .into_iter()
            .find_map(|alts| alts.as_ref().and_then(|v| v.first()))
    }

    fn is_empty(&self) -> bool {
        self.one_of.is_none() && self.any_of.is_none() && self.all_of.is_none()
    }
}

/// Pass-through schema keywords.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaMetadata {
    /// `type`; several entries for OpenAPI 3.1 type arrays.
    pub types: Vec<String>,
    pub format: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<Value>>,
    pub example: Option<Value>,
    pub examples: Option<Vec<Value>>,
    pub nullable: Option<bool>,
    pub deprecated: Option<bool>,
    pub required: Option<Vec<String>>,
    /// Component name the schema was reached through (`x-ref-name`).
    pub ref_name: Option<String>,
    /// Every other keyword, with nested references expanded.
    pub extra: Map<String, Value>,
}

impl SchemaMetadata {
    /// First declared type that is not `null`.
    pub fn primary_type(&self) -> Option<&str> {
        self.types.iter().map(String::as_str).find(|t| *t != "null")
    }
}

/// A schema with every reference expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    pub kind: SchemaKind,
    pub metadata: SchemaMetadata,
}

impl ResolvedSchema {
    pub fn property(&self, name: &str) -> Option<&ResolvedSchema> {
        match &self.kind {
            SchemaKind::Object { properties } => {
                properties.iter().find(|(n, _)| n == name).map(|(_, s)| s)
            }
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&ResolvedSchema> {
        match &self.kind {
            SchemaKind::Array { items } => items.as_deref(),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            SchemaKind::Object { .. } => "object",
            SchemaKind::Array { .. } => "array",
            SchemaKind::Composite(_) => "composite",
            SchemaKind::Scalar => "scalar",
            SchemaKind::Recursive { .. } => "recursive",
            SchemaKind::Unresolved { .. } => "unresolved",
        }
    }

    /// Render back to an OpenAPI-shaped JSON schema with no `$ref` keys.
    ///
    /// Feeding the result to [`expand_schema`] yields an equal value.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        let meta = &self.metadata;
        match meta.types.as_slice() {
            [] => {}
            [single] => {
                out.insert("type".into(), Value::String(single.clone()));
            }
            many => {
                out.insert(
                    "type".into(),
                    Value::Array(many.iter().cloned().map(Value::String).collect()),
                );
            }
        }
        insert_opt(&mut out, "format", meta.format.clone().map(Value::String));
        insert_opt(&mut out, "title", meta.title.clone().map(Value::String));
        insert_opt(&mut out, "description", meta.description.clone().map(Value::String));
        insert_opt(&mut out, "default", meta.default.clone());
        insert_opt(&mut out, "enum", meta.enum_values.clone().map(Value::Array));
        insert_opt(&mut out, "example", meta.example.clone());
        insert_opt(&mut out, "examples", meta.examples.clone().map(Value::Array));
        insert_opt(&mut out, "nullable", meta.nullable.map(Value::Bool));
        insert_opt(&mut out, "deprecated", meta.deprecated.map(Value::Bool));
        insert_opt(
            &mut out,
            "required",
            meta.required
                .as_ref()
                .map(|r| Value::Array(r.iter().cloned().map(Value::String).collect())),
        );
        insert_opt(&mut out, REF_NAME, meta.ref_name.clone().map(Value::String));
        for (k, v) in &meta.extra {
            out.insert(k.clone(), v.clone());
        }

        match &self.kind {
            SchemaKind::Object { properties } => {
                let props = properties
                    .iter()
                    .map(|(name, schema)| (name.clone(), schema.to_json()))
                    .collect::<Map<_, _>>();
                out.insert("properties".into(), Value::Object(props));
            }
            SchemaKind::Array { items } => {
                if let Some(items) = items {
                    out.insert("items".into(), items.to_json());
                }
            }
            SchemaKind::Composite(comp) => {
                for (key, alts) in [
                    ("oneOf", &comp.one_of),
                    ("anyOf", &comp.any_of),
                    ("allOf", &comp.all_of),
                ] {
                    if let Some(alts) = alts {
                        out.insert(
                            key.into(),
                            Value::Array(alts.iter().map(ResolvedSchema::to_json).collect()),
                        );
                    }
                }
            }
            SchemaKind::Scalar => {}
            SchemaKind::Recursive { reference } => {
                out.insert(RECURSIVE_MARKER.into(), Value::String(reference.clone()));
            }
            SchemaKind::Unresolved { reference } => {
                out.insert(UNRESOLVED_MARKER.into(), Value::String(reference.clone()));
            }
        }
        Value::Object(out)
    }
}

impl Serialize for ResolvedSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn insert_opt(out: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(v) = value {
        out.insert(key.to_string(), v);
    }
}

/// Expand a schema node against `spec`.
///
/// Returns `None` when the node is not a schema object or its top-level
/// reference cannot be resolved. Nested dangling references become
/// [`SchemaKind::Unresolved`].
pub fn expand_schema(spec: &RawSpec, schema: &Value) -> Option<ResolvedSchema> {
    let mut expander = Expander {
        spec,
        active: Vec::new(),
    };
    expander.expand_root(schema)
}

/// Expand `schema` when present; convenience for optional `schema` fields.
pub fn expand_optional(spec: &RawSpec, schema: Option<&Value>) -> Option<ResolvedSchema> {
    schema.and_then(|s| expand_schema(spec, s))
}

struct Expander<'a> {
    spec: &'a RawSpec,
    /// References currently being expanded on the recursion path.
    active: Vec<String>,
}

enum Chased<'a> {
    /// Target node, outermost component name, and hops pushed onto the path.
    Node(&'a Value, Option<String>, usize),
    Recursive(String),
    Unresolved(String),
}

impl<'a> Expander<'a> {
    fn expand_root(&mut self, schema: &'a Value) -> Option<ResolvedSchema> {
        match self.chase(schema) {
            Chased::Node(node, ref_name, pushed) => {
                let out = self.expand_object(node, ref_name);
                self.pop(pushed);
                out
            }
            Chased::Recursive(reference) => Some(marker(SchemaKind::Recursive { reference })),
            Chased::Unresolved(reference) => {
                debug!(reference, "top-level schema reference is unresolved");
                None
            }
        }
    }

    fn expand_nested(&mut self, schema: &'a Value) -> ResolvedSchema {
        match self.chase(schema) {
            Chased::Node(node, ref_name, pushed) => {
                let out = self
                    .expand_object(node, ref_name)
                    .unwrap_or_else(|| marker(SchemaKind::Scalar));
                self.pop(pushed);
                out
            }
            Chased::Recursive(reference) => {
                let ref_name = component_name(&reference, "schemas");
                let mut out = marker(SchemaKind::Recursive { reference });
                out.metadata.ref_name = ref_name;
                out
            }
            Chased::Unresolved(reference) => {
                debug!(reference, "nested schema reference is unresolved");
                marker(SchemaKind::Unresolved { reference })
            }
        }
    }

    /// Follow `$ref` hops, pushing every reference onto the active path.
    ///
    /// The outermost component name wins as `ref_name`. Reaching a reference
    /// already on the path yields [`Chased::Recursive`].
    fn chase(&mut self, schema: &'a Value) -> Chased<'a> {
        let mut current = schema;
        let mut ref_name: Option<String> = None;
        let mut pushed = 0;
        while let Some(reference) = ref_of(current) {
            if self.active.iter().any(|r| r == reference) {
                self.pop(pushed);
                return Chased::Recursive(reference.to_string());
            }
            if ref_name.is_none() {
                ref_name = component_name(reference, "schemas");
            }
            match resolve_reference(self.spec, reference) {
                Some(target) => {
                    self.active.push(reference.to_string());
                    pushed += 1;
                    current = target;
                }
                None => {
                    self.pop(pushed);
                    return Chased::Unresolved(reference.to_string());
                }
            }
        }
        // Hops stay on the active path while the target is expanded.
        Chased::Node(current, ref_name, pushed)
    }

    fn pop(&mut self, n: usize) {
        let keep = self.active.len().saturating_sub(n);
        self.active.truncate(keep);
    }

    fn expand_object(&mut self, node: &'a Value, ref_name: Option<String>) -> Option<ResolvedSchema> {
        let obj = node.as_object()?;

        if let Some(reference) = obj.get(RECURSIVE_MARKER).and_then(Value::as_str) {
            let mut out = marker(SchemaKind::Recursive {
                reference: reference.to_string(),
            });
            out.metadata = self.metadata(obj, &[RECURSIVE_MARKER], ref_name);
            return Some(out);
        }
        if let Some(reference) = obj.get(UNRESOLVED_MARKER).and_then(Value::as_str) {
            let mut out = marker(SchemaKind::Unresolved {
                reference: reference.to_string(),
            });
            out.metadata = self.metadata(obj, &[UNRESOLVED_MARKER], ref_name);
            return Some(out);
        }

        let mut composition = Composition::default();
        let mut consumed: Vec<&str> = Vec::new();
        for key in ["oneOf", "anyOf", "allOf"] {
            // Empty keyword arrays stay as pass-through metadata.
            if let Some(alts) = obj.get(key).and_then(Value::as_array).filter(|a| !a.is_empty()) {
                let expanded = alts.iter().map(|alt| self.expand_nested(alt)).collect();
                match key {
                    "oneOf" => composition.one_of = Some(expanded),
                    "anyOf" => composition.any_of = Some(expanded),
                    _ => composition.all_of = Some(expanded),
                }
                consumed.push(key);
            }
        }

        let declares = |t: &str| match obj.get("type") {
            Some(Value::String(s)) => s == t,
            Some(Value::Array(ts)) => ts.iter().any(|v| v.as_str() == Some(t)),
            _ => false,
        };

        let kind = if !composition.is_empty() {
            SchemaKind::Composite(composition)
        } else if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            consumed.push("properties");
            let properties = props
                .iter()
                .map(|(name, prop)| (name.clone(), self.expand_nested(prop)))
                .collect();
            SchemaKind::Object { properties }
        } else if declares("object") {
            SchemaKind::Object {
                properties: Vec::new(),
            }
        } else if obj.get("items").map(Value::is_object).unwrap_or(false) || declares("array") {
            let items = match obj.get("items") {
                Some(items) if items.is_object() => {
                    consumed.push("items");
                    Some(Box::new(self.expand_nested(items)))
                }
                _ => None,
            };
            SchemaKind::Array { items }
        } else {
            SchemaKind::Scalar
        };

        let metadata = self.metadata(obj, &consumed, ref_name);
        Some(ResolvedSchema { kind, metadata })
    }

    fn metadata(
        &mut self,
        obj: &'a Map<String, Value>,
        consumed: &[&str],
        ref_name: Option<String>,
    ) -> SchemaMetadata {
        let mut meta = SchemaMetadata {
            ref_name,
            ..SchemaMetadata::default()
        };
        for (key, value) in obj {
            if consumed.contains(&key.as_str()) || key == "$ref" {
                continue;
            }
            let taken = match (key.as_str(), value) {
                ("type", Value::String(t)) => {
                    meta.types = vec![t.clone()];
                    true
                }
                ("type", Value::Array(ts)) if ts.iter().all(Value::is_string) => {
                    meta.types = ts.iter().filter_map(Value::as_str).map(String::from).collect();
                    true
                }
                ("format", Value::String(s)) => {
                    meta.format = Some(s.clone());
                    true
                }
                ("title", Value::String(s)) => {
                    meta.title = Some(s.clone());
                    true
                }
                ("description", Value::String(s)) => {
                    meta.description = Some(s.clone());
                    true
                }
                ("default", v) => {
                    meta.default = Some(v.clone());
                    true
                }
                ("enum", Value::Array(values)) => {
                    meta.enum_values = Some(values.clone());
                    true
                }
                ("example", v) => {
                    meta.example = Some(v.clone());
                    true
                }
                ("examples", Value::Array(values)) => {
                    meta.examples = Some(values.clone());
                    true
                }
                ("nullable", Value::Bool(b)) => {
                    meta.nullable = Some(*b);
                    true
                }
                ("deprecated", Value::Bool(b)) => {
                    meta.deprecated = Some(*b);
                    true
                }
                ("required", Value::Array(names)) if names.iter().all(Value::is_string) => {
                    meta.required =
                        Some(names.iter().filter_map(Value::as_str).map(String::from).collect());
                    true
                }
                (REF_NAME, Value::String(name)) => {
                    if meta.ref_name.is_none() {
                        meta.ref_name = Some(name.clone());
                    }
                    true
                }
                _ => false,
            };
            if !taken {
                meta.extra.insert(key.clone(), self.expand_value(value));
            }
        }
        meta
    }

    /// Replace every reference object inside an arbitrary keyword value
    /// (`not`, `additionalProperties`, `prefixItems`, ...) with its expansion.
    fn expand_value(&mut self, value: &'a Value) -> Value {
        match value {
            Value::Object(map) if map.contains_key("$ref") => self.expand_nested(value).to_json(),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.expand_value(v)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.expand_value(v)).collect()),
            other => other.clone(),
        }
    }
}

fn marker(kind: SchemaKind) -> ResolvedSchema {
    ResolvedSchema {
        kind,
        metadata: SchemaMetadata::default(),
    }
}
