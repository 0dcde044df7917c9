//! Document codec.
//!
//! A backend document is a flat JSON object where six reserved `$`-prefixed
//! keys carry identity, placement, timestamps and permissions, and every
//! other top-level key belongs to the user payload. [`Document`] splits the
//! two apart; [`Document::to_json`] and [`with_appended_params`] go the other
//! way.

use serde::de::{DeserializeOwned, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const ID: &str = "$id";
pub const COLLECTION_ID: &str = "$collectionId";
pub const DATABASE_ID: &str = "$databaseId";
pub const CREATED_AT: &str = "$createdAt";
pub const UPDATED_AT: &str = "$updatedAt";
pub const PERMISSIONS: &str = "$permissions";

/// The reserved metadata keys, in wire order.
pub const RESERVED_KEYS: [&str; 6] = [
    ID,
    COLLECTION_ID,
    DATABASE_ID,
    CREATED_AT,
    UPDATED_AT,
    PERMISSIONS,
];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document JSON is not an object")]
    NotAnObject,

    #[error("document is missing reserved key {0}")]
    MissingKey(&'static str),

    #[error("reserved key {key} has an unexpected type: {source}")]
    InvalidKey {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("document data does not match the target schema: {0}")]
    Data(#[source] serde_json::Error),

    #[error("document data must serialize to a JSON object")]
    DataNotAnObject,
}

/// A stored document: reserved metadata plus the user payload `data`.
///
/// `data` never contains any of [`RESERVED_KEYS`].
#[derive(Debug, Clone, PartialEq)]
pub struct Document<T> {
    pub id: String,
    pub collection_id: String,
    pub database_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub permissions: Vec<String>,
    pub data: T,
}

impl<T: DeserializeOwned> Document<T> {
    /// Decode a raw document object.
    ///
    /// `$id` is mandatory; the other reserved keys fall back to empty values
    /// when the backend omits them. Everything left after removing the
    /// reserved keys is decoded as `T` without looking inside nested values.
    pub fn from_json(value: Value) -> Result<Self, DocumentError> {
        let Value::Object(mut object) = value else {
            return Err(DocumentError::NotAnObject);
        };

        let id = take_string(&mut object, ID)?.ok_or(DocumentError::MissingKey(ID))?;
        let collection_id = take_string(&mut object, COLLECTION_ID)?.unwrap_or_default();
        let database_id = take_string(&mut object, DATABASE_ID)?.unwrap_or_default();
        let created_at = take_string(&mut object, CREATED_AT)?.unwrap_or_default();
        let updated_at = take_string(&mut object, UPDATED_AT)?.unwrap_or_default();
        let permissions = match object.remove(PERMISSIONS) {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => serde_json::from_value(v).map_err(|source| DocumentError::InvalidKey {
                key: PERMISSIONS,
                source,
            })?,
        };

        let data = serde_json::from_value(Value::Object(object)).map_err(DocumentError::Data)?;

        Ok(Self {
            id,
            collection_id,
            database_id,
            created_at,
            updated_at,
            permissions,
            data,
        })
    }
}

impl<T: Serialize> Document<T> {
    /// Encode back to the raw wire shape with the reserved keys re-injected.
    pub fn to_json(&self) -> Result<Value, DocumentError> {
        let mut object = match serde_json::to_value(&self.data).map_err(DocumentError::Data)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(DocumentError::DataNotAnObject),
        };
        object.insert(ID.into(), Value::String(self.id.clone()));
        object.insert(
            COLLECTION_ID.into(),
            Value::String(self.collection_id.clone()),
        );
        object.insert(DATABASE_ID.into(), Value::String(self.database_id.clone()));
        object.insert(CREATED_AT.into(), Value::String(self.created_at.clone()));
        object.insert(UPDATED_AT.into(), Value::String(self.updated_at.clone()));
        object.insert(
            PERMISSIONS.into(),
            Value::Array(
                self.permissions
                    .iter()
                    .cloned()
                    .map(Value::String)
                    .collect(),
            ),
        );
        Ok(Value::Object(object))
    }
}

impl<T> Document<T> {
    /// Produce a new document with transformed data and the same metadata.
    pub fn map_data<U>(self, f: impl FnOnce(T) -> U) -> Document<U> {
        Document {
            id: self.id,
            collection_id: self.collection_id,
            database_id: self.database_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            permissions: self.permissions,
            data: f(self.data),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Document<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(value).map_err(serde::de::Error::custom)
    }
}

impl<T: Serialize> Serialize for Document<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

/// A page of documents as returned by list calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned", serialize = "T: Serialize"))]
pub struct DocumentList<T> {
    pub total: u64,
    pub documents: Vec<Document<T>>,
}

/// Serialize `data` and merge extra top-level pairs into a fresh object.
///
/// Used to inject reserved keys such as `$permissions` into outgoing
/// payloads. The caller's value is only read.
pub fn with_appended_params<T, I, K>(data: &T, extra: I) -> Result<Value, DocumentError>
where
    T: Serialize + ?Sized,
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let mut object = match serde_json::to_value(data).map_err(DocumentError::Data)? {
        Value::Object(map) => map,
        _ => return Err(DocumentError::DataNotAnObject),
    };
    for (key, value) in extra {
        object.insert(key.into(), value);
    }
    Ok(Value::Object(object))
}

fn take_string(
    object: &mut Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, DocumentError> {
    match object.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v)
            .map(Some)
            .map_err(|source| DocumentError::InvalidKey { key, source }),
    }
}
