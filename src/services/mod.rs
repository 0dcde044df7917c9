//! Typed service wrappers over [`Client::call`](crate::client::Client::call).
//!
//! Each service holds a client handle and the role its calls run under.

pub mod account;
pub mod databases;
pub mod storage;

pub use account::Account;
pub use databases::Databases;
pub use storage::Storage;

/// Percent-encode a path segment.
pub(crate) fn segment(id: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(id)
}
