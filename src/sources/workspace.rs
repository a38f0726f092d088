use super::persistence::{PersistedSources, SourcePersistence};
use super::registry::{SourceRegistry, SpecSource};
use crate::ids::SourceId;
use crate::spec::{collect_operations, Operation, RawSpec, SpecLoadError, SpecLoader};
use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

/// Load state of the active source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "lowercase")]
pub enum LoadStatus {
    Idle,
    Loading,
    Ready,
    Error(String),
}

/// An immutable snapshot of a loaded document.
#[derive(Debug, Clone)]
pub struct LoadedSpec {
    pub source: SpecSource,
    pub spec: RawSpec,
}

impl LoadedSpec {
    pub fn operations(&self) -> Vec<Operation> {
        collect_operations(&self.spec)
    }

    /// URL the document was fetched from, when it came over HTTP.
    pub fn spec_url(&self) -> Option<&str> {
        crate::spec::is_remote(&self.source.url).then_some(self.source.url.as_str())
    }
}

#[derive(Debug)]
pub enum SourceError {
    /// `add_source` was given a blank URL.
    MissingUrl,
    UnknownSource(SourceId),
    Load(SpecLoadError),
    Persist(anyhow::Error),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::MissingUrl => write!(f, "Missing OpenAPI URL."),
            SourceError::UnknownSource(id) => write!(f, "unknown source '{id}'"),
            SourceError::Load(err) => write!(f, "{err}"),
            SourceError::Persist(err) => write!(f, "failed to persist sources: {err:#}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Load(err) => Some(err),
            SourceError::Persist(err) => Some(&**err),
            _ => None,
        }
    }
}

impl From<SpecLoadError> for SourceError {
    fn from(err: SpecLoadError) -> Self {
        SourceError::Load(err)
    }
}

/// Owns the source registry, the load status and the current document.
///
/// Readers get the loaded snapshot without locking. The registry and status
/// locks are only held for short synchronous sections, never across a load.
pub struct SpecWorkspace {
    default_url: String,
    loader: SpecLoader,
    persistence: Arc<dyn SourcePersistence>,
    registry: RwLock<SourceRegistry>,
    status: RwLock<LoadStatus>,
    current: ArcSwapOption<LoadedSpec>,
}

impl SpecWorkspace {
    pub fn new(
        default_url: impl Into<String>,
        loader: SpecLoader,
        persistence: Arc<dyn SourcePersistence>,
    ) -> Self {
        let default_url = default_url.into();
        SpecWorkspace {
            registry: RwLock::new(SourceRegistry::new(default_url.clone())),
            default_url,
            loader,
            persistence,
            status: RwLock::new(LoadStatus::Idle),
            current: ArcSwapOption::empty(),
        }
    }

    fn registry(&self) -> RwLockReadGuard<'_, SourceRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, SourceRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: LoadStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    fn persist(&self) -> Result<(), SourceError> {
        let state = PersistedSources::from_registry(&self.registry());
        self.persistence.save(&state).map_err(SourceError::Persist)
    }

    /// Restore stored sources and load the active one.
    pub async fn init(&self) -> Result<LoadStatus, SourceError> {
        let stored = self.persistence.load().map_err(SourceError::Persist)?;
        let registry = SourceRegistry::restore(
            self.default_url.clone(),
            stored.sources,
            stored.active,
            stored.default_hidden,
        );
        *self.registry_mut() = registry;
        Ok(self.refresh().await)
    }

    pub fn sources(&self) -> Vec<SpecSource> {
        self.registry().sources().to_vec()
    }

    pub fn active_source(&self) -> Option<SpecSource> {
        self.registry().active().cloned()
    }

    pub fn status(&self) -> LoadStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The loaded document, if any.
    pub fn current(&self) -> Option<Arc<LoadedSpec>> {
        self.current.load_full()
    }

    /// Reload the active source.
    ///
    /// On success the source is renamed to the document title. On failure the
    /// previous document is dropped and the status carries the error.
    pub async fn refresh(&self) -> LoadStatus {
        let Some(active) = self.active_source() else {
            self.current.store(None);
            self.set_status(LoadStatus::Idle);
            return LoadStatus::Idle;
        };

        self.set_status(LoadStatus::Loading);
        match self.loader.load(&active.url, active.use_proxy).await {
            Ok(spec) => {
                let mut source = active;
                if let Some(title) = spec.title().map(str::to_string) {
                    let renamed = self.registry_mut().rename(&source.id, &title);
                    if renamed {
                        source.name = title;
                        if let Err(err) = self.persist() {
                            warn!(error = %err, "failed to persist renamed source");
                        }
                    }
                }
                info!(source = %source.id, name = %source.name, "source ready");
                self.current.store(Some(Arc::new(LoadedSpec { source, spec })));
                self.set_status(LoadStatus::Ready);
                LoadStatus::Ready
            }
            Err(err) => {
                warn!(source = %active.id, error = %err, "failed to load source");
                self.current.store(None);
                let status = LoadStatus::Error(err.to_string());
                self.set_status(status.clone());
                status
            }
        }
    }

    /// Switch to another source and load it.
    pub async fn set_active(&self, id: &SourceId) -> Result<LoadStatus, SourceError> {
        if !self.registry_mut().set_active(id) {
            return Err(SourceError::UnknownSource(id.clone()));
        }
        self.persist()?;
        Ok(self.refresh().await)
    }

    /// Load `url` and, if that works, register it as a new active source.
    ///
    /// The source is named after the document title, else `name`, else the
    /// URL. When loading fails nothing is registered and the previous
    /// document and status are restored.
    pub async fn add_source(
        &self,
        name: &str,
        url: &str,
        use_proxy: bool,
    ) -> Result<SpecSource, SourceError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SourceError::MissingUrl);
        }
        let previous_spec = self.current.load_full();
        let previous_status = self.status();
        self.set_status(LoadStatus::Loading);

        let spec = match self.loader.load(url, use_proxy).await {
            Ok(spec) => spec,
            Err(err) => {
                warn!(url, error = %err, "new source failed to load; keeping previous state");
                self.current.store(previous_spec);
                self.set_status(previous_status);
                return Err(SourceError::Load(err));
            }
        };

        let name = spec
            .title()
            .map(str::to_string)
            .or_else(|| Some(name.trim().to_string()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| url.to_string());
        let source = SpecSource {
            id: SourceId::generate(&name),
            name,
            url: url.to_string(),
            is_default: false,
            use_proxy,
        };
        {
            let mut registry = self.registry_mut();
            registry.add(source.clone());
            registry.set_active(&source.id);
        }
        info!(source = %source.id, url, "source added");
        self.current.store(Some(Arc::new(LoadedSpec {
            source: source.clone(),
            spec,
        })));
        self.set_status(LoadStatus::Ready);
        self.persist()?;
        Ok(source)
    }

    /// Remove a source. Returns `false` when `id` is unknown.
    ///
    /// Removing the built-in source hides it for good. Removing the active
    /// source activates the first remaining one, or goes idle.
    pub async fn remove_source(&self, id: &SourceId) -> Result<bool, SourceError> {
        let changed_active = match self.registry_mut().remove(id) {
            None => return Ok(false),
            Some(changed) => changed,
        };
        self.persist()?;
        if changed_active {
            self.refresh().await;
        }
        Ok(true)
    }

    /// Toggle proxy use for a source. Returns whether anything changed.
    pub fn set_source_proxy(&self, id: &SourceId, use_proxy: bool) -> Result<bool, SourceError> {
        let changed = self.registry_mut().set_use_proxy(id, use_proxy);
        if changed {
            self.persist()?;
        }
        Ok(changed)
    }
}

impl fmt::Debug for SpecWorkspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecWorkspace")
            .field("default_url", &self.default_url)
            .field("registry", &*self.registry())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
