//! Typed request parameters.
//!
//! Every call builds a flat list of [`Param`] values. The encoder in the
//! client crate decides per call which variants end up on the wire; variants
//! the target encoding cannot carry are dropped, never rejected.

use bytes::Bytes;
use serde_json::{Map, Value};

/// A single request parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// A plain string value.
    String { key: String, value: String },
    /// A nested JSON object (only carried by JSON bodies).
    Map { key: String, value: Map<String, Value> },
    /// A list of strings (`key[]` in queries and forms, an array in JSON).
    List { key: String, value: Vec<String> },
    /// A list of arbitrary JSON elements.
    JsonList { key: String, value: Vec<Value> },
    /// Binary file content (only carried by multipart bodies).
    File { file_name: String, data: Bytes },
}

impl Param {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::String {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn map(key: impl Into<String>, value: Map<String, Value>) -> Self {
        Self::Map {
            key: key.into(),
            value,
        }
    }

    pub fn list<I, S>(key: impl Into<String>, value: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List {
            key: key.into(),
            value: value.into_iter().map(Into::into).collect(),
        }
    }

    pub fn json_list(key: impl Into<String>, value: Vec<Value>) -> Self {
        Self::JsonList {
            key: key.into(),
            value,
        }
    }

    pub fn file(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::File {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    /// The parameter key. File params are always sent as the `file` part.
    pub fn key(&self) -> &str {
        match self {
            Self::String { key, .. }
            | Self::Map { key, .. }
            | Self::List { key, .. }
            | Self::JsonList { key, .. } => key,
            Self::File { .. } => "file",
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }
}

/// Find the value of a string param by key.
pub fn find_string<'a>(params: &'a [Param], key: &str) -> Option<&'a str> {
    params.iter().find_map(|p| match p {
        Param::String { key: k, value } if k == key => Some(value.as_str()),
        _ => None,
    })
}

/// Find the first file param, returning its name and content.
pub fn find_file(params: &[Param]) -> Option<(&str, &Bytes)> {
    params.iter().find_map(|p| match p {
        Param::File { file_name, data } => Some((file_name.as_str(), data)),
        _ => None,
    })
}

/// Replace the content of every file param with `data`, keeping file names
/// and all sibling params in place.
pub fn replace_file_data(params: &[Param], data: Bytes) -> Vec<Param> {
    params
        .iter()
        .map(|p| match p {
            Param::File { file_name, .. } => Param::File {
                file_name: file_name.clone(),
                data: data.clone(),
            },
            other => other.clone(),
        })
        .collect()
}
