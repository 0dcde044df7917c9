//! HTTP transport seam.
//!
//! The call layer talks to the backend only through [`HttpTransport`]:
//! - `http.rs` holds the reqwest implementation
//! - `cookies.rs` holds the session cookie store used by the client role

pub mod cookies;
pub mod http;

pub use cookies::{SessionCookies, SessionStore};
pub use http::ReqwestTransport;

use crate::encoding::EncodedBody;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use thiserror::Error;

/// Progress hook invoked with `(bytes_transferred, total_bytes)`.
///
/// Called from the transport's own task; must not block.
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Low-level failure below the HTTP layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// The request could not be built (bad URL, bad header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// A fully encoded request, relative to the transport's base URL.
pub struct TransportRequest {
    pub method: Method,
    /// Path without a leading slash.
    pub path: String,
    pub headers: HeaderMap,
    pub body: EncodedBody,
    pub on_upload: Option<ProgressCallback>,
    pub on_download: Option<ProgressCallback>,
}

impl std::fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
