//! Error type for client operations.

use crate::transport::TransportError;
use appwrite_types::{BackendError, DocumentError};
use reqwest::header::InvalidHeaderValue;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No network, or any low-level I/O fault while talking to the backend.
    /// The cause is kept for diagnostics only; callers match on the variant.
    #[error("no network connectivity")]
    NoConnectivity {
        #[source]
        cause: Option<TransportError>,
    },

    /// Well-formed non-success response from the backend.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Malformed caller input or a broken internal invariant.
    #[error("contract violation: {0}")]
    Contract(String),

    /// A success body did not match the requested schema.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("document codec error: {0}")]
    Document(#[from] DocumentError),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    /// The realtime connection sent something outside the protocol.
    #[error("realtime error: {0}")]
    Realtime(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::Contract(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn no_connectivity() -> Self {
        Self::NoConnectivity { cause: None }
    }

    /// Returns the backend error when this is one.
    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            Self::Backend(e) => Some(e),
            _ => None,
        }
    }

    /// True for a backend "not found" response.
    pub fn is_not_found(&self) -> bool {
        self.backend().is_some_and(BackendError::is_not_found)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::InvalidRequest(msg) => Self::Contract(msg),
            other => Self::NoConnectivity { cause: Some(other) },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
