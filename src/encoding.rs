//! Request encoding.
//!
//! Turns a uniform [`Param`] list into exactly one wire shape per call:
//! query pairs for `GET`, a multipart form when the call asks for
//! `multipart/form-data`, and a JSON object otherwise. A variant the chosen
//! shape cannot carry is omitted. Callers pass the same list to every call
//! shape and rely on the omission.

use appwrite_types::Param;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Method;
use serde_json::{Map, Value};

pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
pub const APPLICATION_JSON: &str = "application/json";

/// Body shape requested by the caller for non-GET calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Multipart,
}

impl BodyKind {
    /// Read the hint from a `content-type` header. Anything other than
    /// `multipart/form-data` means JSON.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let is_multipart = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim_start().starts_with(MULTIPART_FORM_DATA));
        if is_multipart {
            Self::Multipart
        } else {
            Self::Json
        }
    }
}

/// One part of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub value: FormValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    /// Sent with `Content-Type: application/octet-stream` and the file name
    /// in `Content-Disposition`.
    File { file_name: String, data: Bytes },
}

/// The encoded request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedBody {
    /// URL query pairs; the request carries no body.
    Query(Vec<(String, String)>),
    Multipart(Vec<FormPart>),
    Json(Map<String, Value>),
}

impl EncodedBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }

    /// Total bytes of file content carried by this body.
    pub fn file_len(&self) -> u64 {
        match self {
            Self::Multipart(parts) => parts
                .iter()
                .map(|p| match &p.value {
                    FormValue::File { data, .. } => data.len() as u64,
                    FormValue::Text(_) => 0,
                })
                .sum(),
            Self::Query(_) | Self::Json(_) => 0,
        }
    }
}

/// Encode `params` for a call with the given method and body hint.
pub fn encode(method: &Method, kind: BodyKind, params: &[Param]) -> EncodedBody {
    if *method == Method::GET {
        EncodedBody::Query(encode_query(params))
    } else {
        match kind {
            BodyKind::Multipart => EncodedBody::Multipart(encode_multipart(params)),
            BodyKind::Json => EncodedBody::Json(encode_json(params)),
        }
    }
}

fn encode_query(params: &[Param]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for param in params {
        match param {
            Param::String { key, value } => pairs.push((key.clone(), value.clone())),
            Param::List { key, value } => {
                let key = format!("{}[]", key);
                pairs.extend(value.iter().map(|v| (key.clone(), v.clone())));
            }
            // A GET request has no body to carry these
            Param::File { .. } | Param::JsonList { .. } | Param::Map { .. } => {}
        }
    }
    pairs
}

fn encode_multipart(params: &[Param]) -> Vec<FormPart> {
    let mut parts = Vec::new();
    for param in params {
        match param {
            Param::File { file_name, data } => parts.push(FormPart {
                name: "file".to_string(),
                value: FormValue::File {
                    file_name: file_name.clone(),
                    data: data.clone(),
                },
            }),
            Param::String { key, value } => parts.push(text_part(key, value.clone())),
            Param::List { key, value } => {
                let name = format!("{}[]", key);
                parts.extend(value.iter().map(|v| text_part(&name, v.clone())));
            }
            Param::JsonList { key, value } => {
                let name = format!("{}[]", key);
                parts.extend(value.iter().map(|v| text_part(&name, v.to_string())));
            }
            // Forms have no nested object representation
            Param::Map { .. } => {}
        }
    }
    parts
}

fn encode_json(params: &[Param]) -> Map<String, Value> {
    let mut object = Map::new();
    for param in params {
        match param {
            Param::String { key, value } => {
                object.insert(key.clone(), Value::String(value.clone()));
            }
            Param::List { key, value } => {
                object.insert(
                    key.clone(),
                    Value::Array(value.iter().cloned().map(Value::String).collect()),
                );
            }
            Param::JsonList { key, value } => {
                object.insert(key.clone(), Value::Array(value.clone()));
            }
            Param::Map { key, value } => {
                object.insert(key.clone(), Value::Object(value.clone()));
            }
            // Binary content only travels in multipart bodies
            Param::File { .. } => {}
        }
    }
    object
}

fn text_part(name: &str, value: String) -> FormPart {
    FormPart {
        name: name.to_string(),
        value: FormValue::Text(value),
    }
}
