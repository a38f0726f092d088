//! # specdeck
//!
//! **specdeck** turns a loosely-conforming [OpenAPI 3.x](https://spec.openapis.org/oas/v3.1.0)
//! document into a fully resolved, `$ref`-free model for rendering API documentation, and
//! executes the described operations against the live API.
//!
//! ## Architecture
//!
//! - **[`spec`]** - Spec Resolver: reference resolution, schema expansion, operation
//!   collection, server templating, security inheritance and example synthesis
//! - **[`client`]** - Request Builder: URL construction and one-shot async execution of
//!   operations by operationId
//! - **[`docs`]** - Documentation index: API info, tags and component schemas
//! - **[`sources`]** - Saved spec locations, the active selection and its load state
//! - **[`proxy`]** - Pass-through HTTP proxy for browsers blocked by CORS
//! - **[`runtime_config`]** / **[`logging`]** - Environment-driven configuration and
//!   `tracing` setup
//! - **[`cli`]** - The `specdeck` command
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant User
//!     participant Loader as spec::SpecLoader
//!     participant Resolver as spec::collect_operations
//!     participant Client as client::OpenApiClient
//!     participant API
//!
//!     User->>Loader: load("https://.../openapi.json")
//!     Loader-->>User: RawSpec
//!     User->>Client: OpenApiClient::new(&spec, options)
//!     Client->>Resolver: collect_operations(&spec)
//!     Resolver-->>Client: Vec<Operation>
//!     User->>Client: call("getPetById", params)
//!     Client->>API: GET /pet/10
//!     API-->>Client: 200 application/json
//!     Client-->>User: ApiResponse { payload: Json(..) }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use specdeck::client::{ClientOptions, OpenApiClient, RequestParams};
//! use specdeck::spec::load_spec;
//!
//! let spec = load_spec("https://petstore3.swagger.io/api/v3/openapi.json").await?;
//! let client = OpenApiClient::new(&spec, ClientOptions::default())?;
//! let pet = client
//!     .call("getPetById", RequestParams::new().path("petId", 10))
//!     .await?;
//! println!("{}", pet.payload);
//! ```
//!
//! Resolution never fails on malformed input: broken fragments degrade to empty
//! values so the rest of the document still renders. Only loading and executing
//! return errors.

pub mod cli;
pub mod client;
pub mod docs;
pub mod ids;
pub mod logging;
pub mod proxy;
pub mod runtime_config;
pub mod sources;
pub mod spec;

pub use client::{ApiPayload, ApiResponse, ClientError, ClientOptions, OpenApiClient, RequestParams};
pub use spec::{
    collect_operations, expand_schema, load_spec, resolve_base_url, resolve_reference,
    resolve_security_requirements, resolve_server_url, schema_example, Operation, RawSpec,
    ResolvedSchema,
};
