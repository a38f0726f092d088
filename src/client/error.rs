use super::ApiPayload;
use std::fmt;

/// Failure of an executed operation.
///
/// Every variant is surfaced immediately; nothing is retried.
#[derive(Debug)]
pub enum ClientError {
    /// The server answered with a non-success status.
    Status {
        status: u16,
        /// Parsed JSON body, or the raw text for other content types.
        payload: ApiPayload,
    },
    /// Connection, TLS, timeout or body read failure.
    Transport(reqwest::Error),
    /// The base URL or the built request URL is not absolute.
    InvalidUrl(String),
    /// A header name or value cannot be sent.
    InvalidHeader { name: String },
    /// The response declared JSON but the body does not parse.
    Decode { status: u16, message: String },
    /// No operation with this operationId.
    UnknownOperation(String),
    /// A declared path parameter has no value.
    MissingPathParameter {
        operation_id: String,
        name: String,
    },
    /// The request body could not be serialized.
    Serialize(serde_json::Error),
}

impl ClientError {
    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } | ClientError::Decode { status, .. } => {
                Some(*status)
            }
            ClientError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Status { status, payload } => {
                write!(f, "request failed with status {status}: {payload}")
            }
            ClientError::Transport(err) => write!(f, "request could not be completed: {err}"),
            ClientError::InvalidUrl(url) => write!(f, "invalid request URL '{url}'"),
            ClientError::InvalidHeader { name } => write!(f, "invalid header '{name}'"),
            ClientError::Decode { status, message } => {
                write!(f, "status {status} response is not valid JSON: {message}")
            }
            ClientError::UnknownOperation(id) => write!(f, "unknown operation '{id}'"),
            ClientError::MissingPathParameter { operation_id, name } => {
                write!(f, "operation '{operation_id}' requires path parameter '{name}'")
            }
            ClientError::Serialize(err) => write!(f, "failed to serialize request body: {err}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Transport(err) => Some(err),
            ClientError::Serialize(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err)
    }
}
