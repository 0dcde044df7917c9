//! Realtime notification payloads and channel names.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One change notification delivered on a realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned", serialize = "T: Serialize"))]
pub struct RealtimeEvent<T> {
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: String,
    pub payload: T,
}

impl RealtimeEvent<Value> {
    /// Decode the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(self) -> Result<RealtimeEvent<T>, serde_json::Error> {
        Ok(RealtimeEvent {
            events: self.events,
            channels: self.channels,
            timestamp: self.timestamp,
            payload: serde_json::from_value(self.payload)?,
        })
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Builders for channel names.
pub struct Channel;

impl Channel {
    pub fn account() -> String {
        "account".to_string()
    }

    pub fn documents(database_id: &str, collection_id: &str) -> String {
        format!(
            "databases.{}.collections.{}.documents",
            database_id, collection_id
        )
    }

    pub fn document(database_id: &str, collection_id: &str, document_id: &str) -> String {
        format!(
            "databases.{}.collections.{}.documents.{}",
            database_id, collection_id, document_id
        )
    }

    pub fn files(bucket_id: &str) -> String {
        format!("buckets.{}.files", bucket_id)
    }

    pub fn file(bucket_id: &str, file_id: &str) -> String {
        format!("buckets.{}.files.{}", bucket_id, file_id)
    }
}
