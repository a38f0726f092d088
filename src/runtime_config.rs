//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the `specdeck` binary.
//!
//! ## Overview
//!
//! Values are read once at startup. Command-line flags override them.
//! Malformed numbers fall back to the defaults instead of failing startup.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `OPENAPI_LOCATION` | `/openapi.json` | URL of the built-in default source |
//! | `SPECDECK_PROXY_ADDR` | `127.0.0.1:8787` | Proxy listen address |
//! | `SPECDECK_PROXY_PATH` | `/api/proxy` | Proxy endpoint path |
//! | `SPECDECK_PROXY_WORKERS` | `4` | Proxy worker threads |
//! | `SPECDECK_PROXY_URL` | unset | Proxy endpoint used by `useProxy` sources |
//! | `SPECDECK_SOURCES_FILE` | `.specdeck/sources.json` | Source registry file |
//! | `SPECDECK_REQUEST_TIMEOUT_SECS` | unset | Timeout for executed calls |
//!
//! ## Usage
//!
//! ```rust
//! use specdeck::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("proxy on {}{}", config.proxy_addr, config.proxy_path);
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SPEC_LOCATION: &str = "/openapi.json";
pub const DEFAULT_PROXY_ADDR: &str = "127.0.0.1:8787";
pub const DEFAULT_PROXY_PATH: &str = "/api/proxy";
pub const DEFAULT_PROXY_WORKERS: usize = 4;
pub const DEFAULT_SOURCES_FILE: &str = ".specdeck/sources.json";

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// URL of the built-in default spec source.
    pub default_spec_location: String,
    pub proxy_addr: String,
    pub proxy_path: String,
    pub proxy_workers: usize,
    /// Full proxy endpoint (e.g. `http://127.0.0.1:8787/api/proxy`).
    pub proxy_url: Option<String>,
    pub sources_file: PathBuf,
    pub request_timeout: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            default_spec_location: DEFAULT_SPEC_LOCATION.to_string(),
            proxy_addr: DEFAULT_PROXY_ADDR.to_string(),
            proxy_path: DEFAULT_PROXY_PATH.to_string(),
            proxy_workers: DEFAULT_PROXY_WORKERS,
            proxy_url: None,
            sources_file: PathBuf::from(DEFAULT_SOURCES_FILE),
            request_timeout: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup (tests use a map).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = RuntimeConfig::default();

        let mut proxy_path = text("SPECDECK_PROXY_PATH").unwrap_or(defaults.proxy_path);
        if !proxy_path.starts_with('/') {
            proxy_path.insert(0, '/');
        }

        RuntimeConfig {
            default_spec_location: text("OPENAPI_LOCATION")
                .unwrap_or(defaults.default_spec_location),
            proxy_addr: text("SPECDECK_PROXY_ADDR").unwrap_or(defaults.proxy_addr),
            proxy_path,
            proxy_workers: text("SPECDECK_PROXY_WORKERS")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.proxy_workers),
            proxy_url: text("SPECDECK_PROXY_URL"),
            sources_file: text("SPECDECK_SOURCES_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.sources_file),
            request_timeout: text("SPECDECK_REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Endpoint clients should use: the explicit `proxy_url`, otherwise the
    /// local listener address joined with the proxy path.
    pub fn proxy_endpoint(&self) -> String {
        match &self.proxy_url {
            Some(url) => url.clone(),
            None => format!("http://{}{}", self.proxy_addr, self.proxy_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> RuntimeConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg, RuntimeConfig::default());
        assert_eq!(cfg.proxy_endpoint(), "http://127.0.0.1:8787/api/proxy");
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("OPENAPI_LOCATION", "https://petstore3.swagger.io/api/v3/openapi.json"),
            ("SPECDECK_PROXY_PATH", "cors"),
            ("SPECDECK_PROXY_WORKERS", "8"),
            ("SPECDECK_PROXY_URL", "https://proxy.internal/cors"),
            ("SPECDECK_REQUEST_TIMEOUT_SECS", "30"),
        ]);
        assert_eq!(
            cfg.default_spec_location,
            "https://petstore3.swagger.io/api/v3/openapi.json"
        );
        assert_eq!(cfg.proxy_path, "/cors");
        assert_eq!(cfg.proxy_workers, 8);
        assert_eq!(cfg.proxy_endpoint(), "https://proxy.internal/cors");
        assert_eq!(cfg.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let cfg = config(&[
            ("SPECDECK_PROXY_WORKERS", "zero"),
            ("SPECDECK_REQUEST_TIMEOUT_SECS", "0"),
        ]);
        assert_eq!(cfg.proxy_workers, DEFAULT_PROXY_WORKERS);
        assert_eq!(cfg.request_timeout, None);
    }
}
