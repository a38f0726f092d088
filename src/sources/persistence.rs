use super::registry::{SourceRegistry, SpecSource};
use crate::ids::SourceId;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// What survives a restart: the source list, the active id and whether the
/// built-in source was removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSources {
    pub sources: Vec<SpecSource>,
    pub active: Option<SourceId>,
    pub default_hidden: bool,
}

impl PersistedSources {
    pub fn from_registry(registry: &SourceRegistry) -> Self {
        PersistedSources {
            sources: registry.sources().to_vec(),
            active: registry.active_id().cloned(),
            default_hidden: registry.default_hidden(),
        }
    }

    /// Lenient parse: malformed entries are skipped, anything unreadable
    /// yields the empty state.
    pub fn from_value(value: &Value) -> Self {
        let sources = value
            .get("sources")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(SpecSource::from_value).collect())
            .unwrap_or_default();
        let active = value
            .get("active")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(SourceId::from);
        let default_hidden = value
            .get("defaultHidden")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        PersistedSources {
            sources,
            active,
            default_hidden,
        }
    }
}

/// Storage for the source registry.
pub trait SourcePersistence: Send + Sync {
    fn load(&self) -> Result<PersistedSources>;
    fn save(&self, state: &PersistedSources) -> Result<()>;
}

/// Registry stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFilePersistence { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourcePersistence for JsonFilePersistence {
    fn load(&self) -> Result<PersistedSources> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored sources");
                return Ok(PersistedSources::default());
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to read sources file {}", self.path.display())
                })
            }
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(value) => Ok(PersistedSources::from_value(&value)),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable sources file");
                Ok(PersistedSources::default())
            }
        }
    }

    fn save(&self, state: &PersistedSources) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(state).context("Failed to serialize sources")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// In-process storage, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    state: Mutex<PersistedSources>,
}

impl MemoryPersistence {
    pub fn new(initial: PersistedSources) -> Self {
        MemoryPersistence {
            state: Mutex::new(initial),
        }
    }

    pub fn snapshot(&self) -> PersistedSources {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SourcePersistence for MemoryPersistence {
    fn load(&self) -> Result<PersistedSources> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &PersistedSources) -> Result<()> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state.clone();
        Ok(())
    }
}
