//! # Request Builder
//!
//! Executes normalized operations against the live API.
//!
//! ## Overview
//!
//! [`OpenApiClient`] is built from a [`RawSpec`] and exposes every operation
//! by its operationId through [`OpenApiClient::call`], plus
//! [`OpenApiClient::request`] for paths outside the operation table. Each
//! call is one attempt: the URL is built with [`build_url`], a JSON body gets
//! `content-type: application/json` unless the caller overrides it, and the
//! response is classified by content type into [`ApiPayload`].
//!
//! Non-success statuses become [`ClientError::Status`] carrying the parsed
//! payload. Retry and timeout policy belong to the caller; a timeout can be
//! set through [`ClientOptions::timeout`].

mod error;
mod request;
mod request_url;

pub use error::ClientError;
pub use request::{RawRequest, RequestParams};
pub use request_url::{build_url, path_placeholders, value_to_param};

use crate::spec::{
    collect_operations, is_json_media_type, resolve_base_url, HttpMethod, Operation,
    ParameterLocation, RawSpec,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info_span, warn, Instrument};

/// Response body, classified by content type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApiPayload {
    Json(Value),
    Text(String),
}

impl ApiPayload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ApiPayload::Json(v) => Some(v),
            ApiPayload::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ApiPayload::Text(t) => Some(t),
            ApiPayload::Json(_) => None,
        }
    }
}

impl fmt::Display for ApiPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiPayload::Json(v) => write!(f, "{v}"),
            ApiPayload::Text(t) => f.write_str(t),
        }
    }
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub payload: ApiPayload,
}

/// Construction options for [`OpenApiClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Explicit base URL; wins over anything derived from the document.
    pub base_url: Option<String>,
    /// Where the document was loaded from, for relative server URLs.
    pub spec_url: Option<String>,
    /// Sent with every call; caller headers override them.
    pub default_headers: Vec<(String, String)>,
    /// Unset means no timeout.
    pub timeout: Option<Duration>,
    /// Reuse an existing client (and its connection pool).
    pub http: Option<reqwest::Client>,
}

impl ClientOptions {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn spec_url(mut self, spec_url: impl Into<String>) -> Self {
        self.spec_url = Some(spec_url.into());
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn http(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }
}

/// Live client over a resolved operation table.
#[derive(Debug, Clone)]
pub struct OpenApiClient {
    http: reqwest::Client,
    base_url: String,
    default_headers: HeaderMap,
    operations: Vec<Operation>,
    by_id: HashMap<String, usize>,
}

impl OpenApiClient {
    /// Resolve the operations of `spec` and prepare a client for them.
    pub fn new(spec: &RawSpec, options: ClientOptions) -> Result<Self, ClientError> {
        let base_url = match &options.base_url {
            Some(explicit) => explicit.trim_end_matches('/').to_string(),
            None => resolve_base_url(spec, options.spec_url.as_deref()),
        };
        Self::from_operations(collect_operations(spec), base_url, options)
    }

    /// Build a client over an already collected operation list.
    ///
    /// When two operations share an operationId the first one is callable by
    /// that id; the other stays reachable through [`OpenApiClient::execute`].
    pub fn from_operations(
        operations: Vec<Operation>,
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let http = match options.http {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = options.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };

        let mut default_headers = HeaderMap::new();
        for (name, value) in &options.default_headers {
            let (name, value) = header_pair(name, value)?;
            default_headers.insert(name, value);
        }

        let mut by_id = HashMap::with_capacity(operations.len());
        for (idx, op) in operations.iter().enumerate() {
            if by_id.contains_key(&op.operation_id) {
                warn!(
                    operation_id = %op.operation_id,
                    path = %op.path,
                    method = %op.method,
                    "duplicate operationId; keeping the first declaration"
                );
                continue;
            }
            by_id.insert(op.operation_id.clone(), idx);
        }

        Ok(OpenApiClient {
            http,
            base_url: base_url.into(),
            default_headers,
            operations,
            by_id,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn operation(&self, operation_id: &str) -> Option<&Operation> {
        self.by_id
            .get(operation_id)
            .and_then(|&idx| self.operations.get(idx))
    }

    /// Execute the operation registered under `operation_id`.
    pub async fn call(
        &self,
        operation_id: &str,
        params: RequestParams,
    ) -> Result<ApiResponse, ClientError> {
        let operation = self
            .operation(operation_id)
            .ok_or_else(|| ClientError::UnknownOperation(operation_id.to_string()))?;
        self.execute(operation, params).await
    }

    /// Execute a normalized operation.
    ///
    /// Every declared path parameter must have a non-null value.
    pub async fn execute(
        &self,
        operation: &Operation,
        params: RequestParams,
    ) -> Result<ApiResponse, ClientError> {
        for param in operation.parameters_in(ParameterLocation::Path) {
            let supplied = params
                .path_params
                .get(&param.name)
                .map(|v| !v.is_null())
                .unwrap_or(false);
            if !supplied {
                return Err(ClientError::MissingPathParameter {
                    operation_id: operation.operation_id.clone(),
                    name: param.name.clone(),
                });
            }
        }
        let span = info_span!(
            "api_call",
            operation_id = %operation.operation_id,
            method = %operation.method,
            path = %operation.path,
        );
        self.send(operation.method, &operation.path, params)
            .instrument(span)
            .await
    }

    /// Send a request outside the operation table.
    pub async fn request(&self, request: RawRequest) -> Result<ApiResponse, ClientError> {
        let span = info_span!("api_request", method = %request.method, path = %request.path);
        self.send(request.method, &request.path, request.params)
            .instrument(span)
            .await
    }

    async fn send(
        &self,
        method: HttpMethod,
        path_template: &str,
        params: RequestParams,
    ) -> Result<ApiResponse, ClientError> {
        let url = build_url(
            &self.base_url,
            path_template,
            &params.path_params,
            &params.query,
        )?;

        let mut headers = self.default_headers.clone();
        let body = match &params.body {
            Some(body) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Some(serde_json::to_vec(body).map_err(ClientError::Serialize)?)
            }
            None => None,
        };
        for (name, value) in &params.headers {
            let (name, value) = header_pair(name, value)?;
            headers.insert(name, value);
        }

        debug!(%url, "sending request");
        let mut builder = self
            .http
            .request(http::Method::from(method), &url)
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let response = builder.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let payload = read_payload(response).await?;
        debug!(status = status.as_u16(), "response received");

        if status.is_success() {
            Ok(ApiResponse {
                status: status.as_u16(),
                headers,
                payload,
            })
        } else {
            Err(ClientError::Status {
                status: status.as_u16(),
                payload,
            })
        }
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ClientError> {
    let invalid = || ClientError::InvalidHeader {
        name: name.to_string(),
    };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
    let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    Ok((header_name, header_value))
}

/// JSON when the content type says so, text otherwise. An empty body is
/// always empty text.
async fn read_payload(response: reqwest::Response) -> Result<ApiPayload, ClientError> {
    let status = response.status().as_u16();
    let json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().contains("application/json") || is_json_media_type(ct))
        .unwrap_or(false);
    let text = response.text().await?;
    if !json || text.trim().is_empty() {
        return Ok(ApiPayload::Text(text));
    }
    serde_json::from_str(&text)
        .map(ApiPayload::Json)
        .map_err(|e| ClientError::Decode {
            status,
            message: e.to_string(),
        })
}
