//! Client core for a document database and file storage backend.
//!
//! - [`client`] dispatches calls under a client or server role
//! - [`upload`] streams large files in resumable chunks
//! - [`realtime`] subscribes to change channels and drives live views
//! - [`services`] wraps the REST surface in typed calls

pub mod cli;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod encoding;
pub mod error;
pub mod realtime;
pub mod services;
pub mod transport;
pub mod upload;

pub use appwrite_types::{
    with_appended_params, BackendError, Channel, Document, DocumentError, DocumentList, File,
    FileList, InputFile, Param, Query, RealtimeEvent, Session, UploadProgress, User, CHUNK_SIZE,
    RESERVED_KEYS, UNIQUE_ID,
};
pub use client::{Call, Client, ClientBuilder, Role};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use realtime::{LiveView, RealtimeTransport, Subscription, RECONNECTED_EVENT};

pub const SDK_NAME: &str = "appwrite-bridge";
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
