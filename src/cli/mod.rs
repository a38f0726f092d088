//! # CLI Module
//!
//! Command-line front end over the resolver, the request client, the source
//! registry and the proxy.
//!
//! ## Commands
//!
//! ```bash
//! # Summarize a document (file or URL; defaults to the active source)
//! specdeck inspect --spec https://petstore3.swagger.io/api/v3/openapi.json
//!
//! # Operations grouped by tag
//! specdeck tags --spec openapi.yaml
//!
//! # One resolved operation, by operationId or "METHOD /path"
//! specdeck show getPetById --spec openapi.yaml
//! specdeck show "DELETE /pet/{petId}" --spec openapi.yaml
//!
//! # Synthesized examples
//! specdeck example --schema Pet --spec openapi.yaml
//! specdeck example --operation addPet --response 200 --spec openapi.yaml
//!
//! # Live calls
//! specdeck call getPetById -p petId=10 -H api_key=secret
//! specdeck call addPet -b @pet.json
//!
//! # Saved sources
//! specdeck sources add https://petstore3.swagger.io/api/v3/openapi.json --proxy
//! specdeck sources list
//! specdeck sources use swagger-petstore-openapi-3-0-k2q7d
//!
//! # Pass-through proxy (stops on SIGINT / SIGTERM)
//! specdeck proxy --addr 127.0.0.1:8787
//! ```
//!
//! Defaults come from [`RuntimeConfig`](crate::runtime_config::RuntimeConfig);
//! flags override them.

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{
    parse_key_value, run, run_cli, select_operation, Cli, Commands, SourcesCommand, SpecArgs,
};
