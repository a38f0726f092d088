//! # Spec Sources
//!
//! Named spec locations, one of them active, persisted between runs.
//!
//! ## Overview
//!
//! - [`SourceRegistry`] is the pure source list with its normalization rules
//!   (built-in `default` source first unless hidden, duplicate ids dropped,
//!   active id falling back to the first source).
//! - [`SourcePersistence`] stores the registry ([`JsonFilePersistence`] on
//!   disk, [`MemoryPersistence`] in process).
//! - [`SpecWorkspace`] ties the registry to a [`SpecLoader`](crate::spec::SpecLoader):
//!   switching sources reloads, adding a source loads it first and only
//!   registers it on success.

mod persistence;
mod registry;
mod workspace;

pub use persistence::{JsonFilePersistence, MemoryPersistence, PersistedSources, SourcePersistence};
pub use registry::{SourceRegistry, SpecSource, DEFAULT_SOURCE_NAME};
pub use workspace::{LoadStatus, LoadedSpec, SourceError, SpecWorkspace};
