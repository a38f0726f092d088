//! Loading OpenAPI documents from disk or over HTTP.

use super::types::RawSpec;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn, Instrument};

/// Failure to obtain or parse a spec document.
#[derive(Debug)]
pub enum SpecLoadError {
    /// Local file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The HTTP request itself failed.
    Transport(reqwest::Error),
    /// The server answered with a non-success status.
    Status(u16),
    /// The body is neither valid JSON nor valid YAML.
    Parse { location: String, message: String },
    /// The document parsed, but its root is not an object.
    NotAnObject { location: String },
}

impl fmt::Display for SpecLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecLoadError::Io { path, source } => {
                write!(f, "failed to read spec file {}: {}", path.display(), source)
            }
            SpecLoadError::Transport(err) => write!(f, "failed to fetch spec: {err}"),
            SpecLoadError::Status(code) => write!(f, "failed to load spec: HTTP {code}"),
            SpecLoadError::Parse { location, message } => {
                write!(f, "failed to parse spec from {location}: {message}")
            }
            SpecLoadError::NotAnObject { location } => {
                write!(f, "spec from {location} is not a JSON object")
            }
        }
    }
}

impl std::error::Error for SpecLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpecLoadError::Io { source, .. } => Some(source),
            SpecLoadError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SpecLoadError {
    fn from(err: reqwest::Error) -> Self {
        SpecLoadError::Transport(err)
    }
}

fn looks_like_yaml(location: &str) -> bool {
    let path = location
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    path.ends_with(".yaml") || path.ends_with(".yml")
}

/// Parse document text as JSON, or as YAML when `yaml` is set.
pub fn parse_document(text: &str, yaml: bool, location: &str) -> Result<RawSpec, SpecLoadError> {
    let value: Value = if yaml {
        serde_yaml::from_str(text).map_err(|e| SpecLoadError::Parse {
            location: location.to_string(),
            message: e.to_string(),
        })?
    } else {
        serde_json::from_str(text).map_err(|e| SpecLoadError::Parse {
            location: location.to_string(),
            message: e.to_string(),
        })?
    };
    if !value.is_object() {
        return Err(SpecLoadError::NotAnObject {
            location: location.to_string(),
        });
    }
    let spec = RawSpec::new(value);
    match spec.openapi_version() {
        Some(_) if spec.is_v3() => {}
        Some(version) => warn!(location, version, "document is not OpenAPI 3.x; rendering anyway"),
        None => warn!(location, "document declares no openapi version"),
    }
    Ok(spec)
}

/// Read a spec from disk. `.yaml` / `.yml` files are parsed as YAML.
pub fn load_spec_file(path: impl AsRef<Path>) -> Result<RawSpec, SpecLoadError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| SpecLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let location = path.display().to_string();
    parse_document(&content, looks_like_yaml(&location), &location)
}

/// Whether a location should be fetched over HTTP rather than read from disk.
pub fn is_remote(location: &str) -> bool {
    let lower = location.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// `{endpoint}?url={target}` with the target percent-encoded.
pub fn proxied_url(endpoint: &str, target: &str) -> String {
    let sep = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{sep}url={}", urlencoding::encode(target))
}

/// Fetches spec documents, optionally through the CORS proxy.
#[derive(Debug, Clone, Default)]
pub struct SpecLoader {
    client: reqwest::Client,
    proxy_endpoint: Option<String>,
}

impl SpecLoader {
    pub fn new(client: reqwest::Client) -> Self {
        SpecLoader {
            client,
            proxy_endpoint: None,
        }
    }

    /// Route proxied fetches through `endpoint` (e.g. `http://127.0.0.1:8787/api/proxy`).
    pub fn with_proxy(mut self, endpoint: impl Into<String>) -> Self {
        self.proxy_endpoint = Some(endpoint.into());
        self
    }

    pub fn proxy_endpoint(&self) -> Option<&str> {
        self.proxy_endpoint.as_deref()
    }

    /// GET a spec over HTTP.
    ///
    /// With `use_proxy` and a configured endpoint the request goes to the
    /// proxy instead of the target. The body is parsed as YAML when the
    /// content type or the URL says so, as JSON otherwise.
    pub async fn fetch(&self, url: &str, use_proxy: bool) -> Result<RawSpec, SpecLoadError> {
        let request_url = match (&self.proxy_endpoint, use_proxy) {
            (Some(endpoint), true) => proxied_url(endpoint, url),
            _ => url.to_string(),
        };
        debug!(url, request_url, "fetching spec");
        let response = self.client.get(&request_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SpecLoadError::Status(status.as_u16()));
        }
        let yaml_content = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().contains("yaml"))
            .unwrap_or(false);
        let text = response.text().await?;
        parse_document(&text, yaml_content || looks_like_yaml(url), url)
    }

    /// Load from an `http(s)` URL or a local path.
    pub async fn load(&self, location: &str, use_proxy: bool) -> Result<RawSpec, SpecLoadError> {
        let span = info_span!("spec_load", location, use_proxy);
        async {
            let spec = if is_remote(location) {
                self.fetch(location.trim(), use_proxy).await?
            } else {
                load_spec_file(location)?
            };
            info!(
                title = spec.title().unwrap_or_default(),
                version = spec.openapi_version().unwrap_or_default(),
                "spec loaded"
            );
            Ok(spec)
        }
        .instrument(span)
        .await
    }
}

/// Load a spec from a file path or URL with a default client.
pub async fn load_spec(location: &str) -> Result<RawSpec, SpecLoadError> {
    SpecLoader::default().load(location, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_json_and_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("spec.json");
        std::fs::write(&json_path, r#"{"openapi": "3.0.0", "info": {"title": "J"}}"#).unwrap();
        assert_eq!(load_spec_file(&json_path).unwrap().title(), Some("J"));

        let yaml_path = dir.path().join("spec.yaml");
        let mut f = std::fs::File::create(&yaml_path).unwrap();
        writeln!(f, "openapi: 3.1.0\ninfo:\n  title: Y\npaths: {{}}").unwrap();
        let spec = load_spec_file(&yaml_path).unwrap();
        assert_eq!(spec.title(), Some("Y"));
        assert!(spec.is_v3());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(load_spec_file(&missing), Err(SpecLoadError::Io { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(matches!(load_spec_file(&bad), Err(SpecLoadError::Parse { .. })));

        let array = dir.path().join("array.json");
        std::fs::write(&array, "[1, 2]").unwrap();
        assert!(matches!(
            load_spec_file(&array),
            Err(SpecLoadError::NotAnObject { .. })
        ));
    }

    #[test]
    fn test_non_v3_is_accepted() {
        let spec = parse_document(r#"{"swagger": "2.0"}"#, false, "inline").unwrap();
        assert!(!spec.is_v3());
    }

    #[test]
    fn test_proxied_url_and_remote_detection() {
        assert_eq!(
            proxied_url("http://127.0.0.1:8787/api/proxy", "https://x.io/a b?c=1"),
            "http://127.0.0.1:8787/api/proxy?url=https%3A%2F%2Fx.io%2Fa%20b%3Fc%3D1"
        );
        assert_eq!(proxied_url("/p?k=v", "http://a"), "/p?k=v&url=http%3A%2F%2Fa");
        assert!(is_remote("HTTPS://example.com/openapi.json"));
        assert!(!is_remote("./openapi.json"));
        assert!(looks_like_yaml("https://x.io/spec.YML?raw=1"));
    }
}
