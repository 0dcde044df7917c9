//! Shared types for the appwrite-bridge client core.

pub mod document;
pub mod error;
pub mod models;
pub mod params;
pub mod query;
pub mod realtime;
pub mod upload;

pub use document::{with_appended_params, Document, DocumentError, DocumentList, RESERVED_KEYS};
pub use error::BackendError;
pub use models::{File, FileList, InputFile, Session, User};
pub use params::Param;
pub use query::Query;
pub use realtime::{Channel, RealtimeEvent};
pub use upload::{UploadProgress, CHUNK_SIZE};

/// Placeholder id that asks the backend to generate a unique id.
pub const UNIQUE_ID: &str = "unique()";
