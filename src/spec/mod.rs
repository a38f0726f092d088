//! # Spec Resolver
//!
//! Normalizes a raw OpenAPI 3.x document into a `$ref`-free model.
//!
//! ## Overview
//!
//! Everything here is a pure function of an immutable [`RawSpec`]:
//!
//! - [`resolve_reference`] / [`deref`] follow local `#/...` pointers
//! - [`expand_schema`] builds a [`ResolvedSchema`] tree, guarding against cycles
//! - [`collect_operations`] walks `paths` into sorted [`Operation`]s
//! - [`resolve_server_url`] / [`resolve_base_url`] handle server templating
//! - [`resolve_security_requirements`] surfaces the effective security
//! - [`schema_example`] synthesizes example payloads
//!
//! Malformed fragments degrade to `None`, empty lists or defaults, so a single
//! broken operation never prevents the rest of the document from rendering.
//! [`load`] is the only part that performs I/O.

mod build;
mod example;
pub mod load;
mod refs;
mod schema;
mod security;
mod servers;
mod types;

pub use build::{
    collect_operations, derive_operation_id, extract_content, extract_parameters,
    extract_request_body, extract_responses, find_operation, operation_by_id,
};
pub use example::{example_for, schema_example, STRING_PLACEHOLDER};
pub use load::{is_remote, load_spec, load_spec_file, parse_document, SpecLoadError, SpecLoader};
pub use refs::{component_name, deref, ref_of, resolve_reference};
pub use schema::{
    expand_optional, expand_schema, Composition, ResolvedSchema, SchemaKind, SchemaMetadata,
};
pub use security::{resolve_security_requirements, security_schemes};
pub use servers::{
    document_servers, operation_server_url, parse_server, parse_servers, resolve_base_url,
    resolve_server_url,
};
pub use types::*;
