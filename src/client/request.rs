use crate::spec::HttpMethod;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Caller-supplied values for one call.
///
/// Deserializes from `{"pathParams": {...}, "query": {...}, "body": ..., "headers": {...}}`
/// with every field optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestParams {
    pub path_params: Map<String, Value>,
    pub query: Map<String, Value>,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A call that bypasses the operation table.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRequest {
    pub method: HttpMethod,
    /// Path template relative to the base URL; `{name}` placeholders allowed.
    pub path: String,
    pub params: RequestParams,
}

impl RawRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        RawRequest {
            method,
            path: path.into(),
            params: RequestParams::default(),
        }
    }

    pub fn with_params(mut self, params: RequestParams) -> Self {
        self.params = params;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_from_json() {
        let params: RequestParams = serde_json::from_value(json!({
            "pathParams": {"id": 3},
            "headers": {"X-Trace": "t1"}
        }))
        .unwrap();
        assert_eq!(params.path_params.get("id"), Some(&json!(3)));
        assert!(params.query.is_empty());
        assert!(params.body.is_none());
        assert_eq!(params.headers.get("X-Trace").map(String::as_str), Some("t1"));
    }

    #[test]
    fn test_builder() {
        let params = RequestParams::new()
            .path("id", "p1")
            .query("tag", json!(["a", "b"]))
            .body(json!({"name": "Rex"}))
            .header("Accept", "application/json");
        assert_eq!(params.query["tag"], json!(["a", "b"]));
        assert_eq!(params.body, Some(json!({"name": "Rex"})));
    }
}
