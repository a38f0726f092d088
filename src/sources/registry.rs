use crate::ids::SourceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Display name of the built-in source until its document is loaded.
pub const DEFAULT_SOURCE_NAME: &str = "Default API";

/// One configured spec location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecSource {
    pub id: SourceId,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub use_proxy: bool,
}

impl SpecSource {
    /// The built-in source pointing at `url`.
    pub fn default_source(url: impl Into<String>) -> Self {
        SpecSource {
            id: SourceId::default_source(),
            name: DEFAULT_SOURCE_NAME.to_string(),
            url: url.into(),
            is_default: true,
            use_proxy: false,
        }
    }

    /// Lenient parse of a stored entry.
    ///
    /// Entries without an id or url are rejected; a blank name falls back to
    /// the url.
    pub fn from_value(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;
        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };
        let flag = |key: &str| match obj.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | None => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Some(_) => true,
        };
        let (id, url, name) = (text("id"), text("url"), text("name"));
        if id.is_empty() || url.is_empty() {
            return None;
        }
        Some(SpecSource {
            id: SourceId::from(id.as_str()),
            name: if name.is_empty() { url.clone() } else { name },
            url,
            is_default: flag("isDefault"),
            use_proxy: flag("useProxy"),
        })
    }
}

/// The source list and the active selection.
///
/// Pure data: loading documents and persisting is the workspace's job.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRegistry {
    builtin: SpecSource,
    sources: Vec<SpecSource>,
    active: Option<SourceId>,
    default_hidden: bool,
}

impl SourceRegistry {
    /// Registry containing only the built-in source, which is active.
    pub fn new(default_url: impl Into<String>) -> Self {
        let builtin = SpecSource::default_source(default_url);
        SourceRegistry {
            active: Some(builtin.id.clone()),
            sources: vec![builtin.clone()],
            builtin,
            default_hidden: false,
        }
    }

    /// Rebuild from stored state.
    ///
    /// Duplicate ids keep their first entry. A stored entry for the built-in id
    /// overrides its fields. The built-in source leads the list unless hidden.
    pub fn restore(
        default_url: impl Into<String>,
        stored: Vec<SpecSource>,
        active: Option<SourceId>,
        default_hidden: bool,
    ) -> Self {
        let mut registry = SourceRegistry::new(default_url);
        registry.default_hidden = default_hidden;
        registry.sources = stored;
        registry.normalize();
        registry.active = registry.resolve_active(active.as_ref()).map(|s| s.id.clone());
        registry
    }

    fn normalize(&mut self) {
        let mut builtin = self.builtin.clone();
        let mut seen: Vec<SourceId> = Vec::new();
        let mut next: Vec<SpecSource> = Vec::new();
        for source in std::mem::take(&mut self.sources) {
            if source.id.is_default() {
                builtin = SpecSource {
                    is_default: true,
                    ..source
                };
                continue;
            }
            if seen.contains(&source.id) {
                continue;
            }
            seen.push(source.id.clone());
            next.push(source);
        }
        self.builtin = builtin;
        if !self.default_hidden {
            next.insert(0, self.builtin.clone());
        }
        self.sources = next;
    }

    /// The source with `id`, else the first source.
    fn resolve_active(&self, id: Option<&SourceId>) -> Option<&SpecSource> {
        id.and_then(|id| self.get(id))
            .or_else(|| self.sources.first())
    }

    pub fn sources(&self) -> &[SpecSource] {
        &self.sources
    }

    pub fn get(&self, id: &SourceId) -> Option<&SpecSource> {
        self.sources.iter().find(|s| &s.id == id)
    }

    pub fn active_id(&self) -> Option<&SourceId> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&SpecSource> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    pub fn default_hidden(&self) -> bool {
        self.default_hidden
    }

    /// Select a source. Returns `false` for an unknown id.
    pub fn set_active(&mut self, id: &SourceId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.active = Some(id.clone());
        true
    }

    /// Append a source and normalize.
    pub fn add(&mut self, source: SpecSource) {
        self.sources.push(source);
        self.normalize();
    }

    /// Remove a source. Removing the built-in source hides it.
    ///
    /// When the active source goes away the first remaining source becomes
    /// active, or nothing. Returns `None` when `id` is unknown, otherwise
    /// whether the active selection changed.
    pub fn remove(&mut self, id: &SourceId) -> Option<bool> {
        self.get(id)?;
        if id.is_default() {
            self.default_hidden = true;
        }
        self.sources.retain(|s| &s.id != id);
        self.normalize();
        if self.active.as_ref() != Some(id) {
            return Some(false);
        }
        self.active = self.sources.first().map(|s| s.id.clone());
        Some(true)
    }

    /// Toggle the proxy flag. Returns whether anything changed.
    pub fn set_use_proxy(&mut self, id: &SourceId, use_proxy: bool) -> bool {
        match self.sources.iter_mut().find(|s| &s.id == id) {
            Some(source) if source.use_proxy != use_proxy => {
                source.use_proxy = use_proxy;
                if source.id.is_default() {
                    self.builtin.use_proxy = use_proxy;
                }
                true
            }
            _ => false,
        }
    }

    /// Rename a source, typically to the loaded document's title.
    pub fn rename(&mut self, id: &SourceId, name: &str) -> bool {
        match self.sources.iter_mut().find(|s| &s.id == id) {
            Some(source) if source.name != name => {
                source.name = name.to_string();
                if source.id.is_default() {
                    self.builtin.name = name.to_string();
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(id: &str, url: &str) -> SpecSource {
        SpecSource {
            id: SourceId::from(id),
            name: id.to_uppercase(),
            url: url.to_string(),
            is_default: false,
            use_proxy: false,
        }
    }

    #[test]
    fn test_from_value_is_lenient() {
        let parsed = SpecSource::from_value(&json!({
            "id": " pets ", "url": " https://x/openapi.json ", "name": "  ", "useProxy": 1
        }))
        .unwrap();
        assert_eq!(parsed.id.as_str(), "pets");
        assert_eq!(parsed.name, "https://x/openapi.json");
        assert!(parsed.use_proxy);
        assert!(SpecSource::from_value(&json!({"id": "x"})).is_none());
        assert!(SpecSource::from_value(&json!("nope")).is_none());
    }

    #[test]
    fn test_restore_dedupes_and_leads_with_builtin() {
        let mut stored_default = source("default", "/custom.json");
        stored_default.is_default = false;
        let registry = SourceRegistry::restore(
            "/openapi.json",
            vec![source("a", "/a"), stored_default, source("a", "/dup"), source("b", "/b")],
            Some(SourceId::from("b")),
            false,
        );
        let ids: Vec<&str> = registry.sources().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["default", "a", "b"]);
        assert_eq!(registry.sources()[0].url, "/custom.json");
        assert!(registry.sources()[0].is_default);
        assert_eq!(registry.sources()[1].url, "/a");
        assert_eq!(registry.active_id().map(SourceId::as_str), Some("b"));
    }

    #[test]
    fn test_unknown_active_falls_back_to_first() {
        let registry = SourceRegistry::restore(
            "/openapi.json",
            vec![source("a", "/a")],
            Some(SourceId::from("gone")),
            true,
        );
        assert_eq!(registry.active_id().map(SourceId::as_str), Some("a"));
    }

    #[test]
    fn test_remove_default_hides_it() {
        let mut registry = SourceRegistry::new("/openapi.json");
        registry.add(source("a", "/a"));
        assert_eq!(registry.remove(&SourceId::default_source()), Some(true));
        assert!(registry.default_hidden());
        assert_eq!(registry.active_id().map(SourceId::as_str), Some("a"));
        registry.add(source("b", "/b"));
        let ids: Vec<&str> = registry.sources().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_remove_last_goes_idle() {
        let mut registry = SourceRegistry::restore("/openapi.json", vec![], None, true);
        assert!(registry.active().is_none());
        registry.add(source("a", "/a"));
        assert!(registry.set_active(&SourceId::from("a")));
        assert_eq!(registry.remove(&SourceId::from("a")), Some(true));
        assert!(registry.active().is_none());
        assert_eq!(registry.remove(&SourceId::from("a")), None);
    }

    #[test]
    fn test_proxy_and_rename() {
        let mut registry = SourceRegistry::new("/openapi.json");
        let id = SourceId::default_source();
        assert!(registry.set_use_proxy(&id, true));
        assert!(!registry.set_use_proxy(&id, true));
        assert!(registry.rename(&id, "Pet Store"));
        registry.add(source("a", "/a"));
        assert_eq!(registry.sources()[0].name, "Pet Store");
        assert!(registry.sources()[0].use_proxy);
    }
}
