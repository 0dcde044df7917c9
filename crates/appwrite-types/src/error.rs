//! Structured error returned by the backend for non-success responses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A decoded non-success response.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct BackendError {
    pub message: String,
    pub code: u16,
    /// Backend error type, e.g. `document_not_found`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// The raw response body.
    #[serde(default, skip_serializing)]
    pub response: String,
}

#[derive(Deserialize)]
struct WireError {
    message: Option<String>,
    code: Option<u16>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl BackendError {
    /// Decode an error body, falling back to the HTTP status when the body
    /// is not the documented JSON shape.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let response = String::from_utf8_lossy(body).into_owned();
        match serde_json::from_slice::<WireError>(body) {
            Ok(wire) => Self {
                message: wire.message.unwrap_or_else(|| response.clone()),
                code: wire.code.filter(|c| *c != 0).unwrap_or(status),
                kind: wire.kind,
                response,
            },
            Err(_) => Self {
                message: if response.trim().is_empty() {
                    format!("request failed with status {}", status)
                } else {
                    response.clone()
                },
                code: status,
                kind: None,
                response,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code == 404
    }
}
