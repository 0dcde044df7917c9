//! Client configuration.
//!
//! A [`ClientConfig`] is read once (from code, a JSON file, or the
//! environment) and frozen inside the client. The per-role base header sets
//! are derived from it at construction time.

use crate::client::Role;
use crate::encoding::APPLICATION_JSON;
use crate::error::{Error, Result};
use crate::{SDK_NAME, SDK_VERSION};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const HEADER_PROJECT: &str = "x-appwrite-project";
pub const HEADER_KEY: &str = "x-appwrite-key";
pub const HEADER_SDK_NAME: &str = "x-sdk-name";
pub const HEADER_SDK_VERSION: &str = "x-sdk-version";

/// Fixed network timeouts, applied uniformly to every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,
    #[serde(default = "default_read_ms")]
    pub read_ms: u64,
    #[serde(default = "default_request_ms")]
    pub request_ms: u64,
}

fn default_connect_ms() -> u64 {
    10_000
}

fn default_read_ms() -> u64 {
    10_000
}

fn default_request_ms() -> u64 {
    15_000
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_ms(),
            read_ms: default_read_ms(),
            request_ms: default_request_ms(),
        }
    }
}

impl Timeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// REST endpoint, e.g. `https://cloud.example.com/v1/`.
    pub endpoint: String,
    /// Realtime endpoint. Derived from `endpoint` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime_endpoint: Option<String>,
    pub project_id: String,
    /// Enables the server role.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Accept self-signed TLS certificates.
    #[serde(default)]
    pub self_signed: bool,
    #[serde(default)]
    pub timeouts: Timeouts,
    /// Added to the base headers of both roles.
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_heartbeat_secs() -> u64 {
    20
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("realtime_endpoint", &self.realtime_endpoint)
            .field("project_id", &self.project_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("self_signed", &self.self_signed)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            realtime_endpoint: None,
            project_id: project_id.into(),
            api_key: None,
            self_signed: false,
            timeouts: Timeouts::default(),
            extra_headers: BTreeMap::new(),
            heartbeat_secs: default_heartbeat_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_realtime_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.realtime_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_self_signed(mut self, self_signed: bool) -> Self {
        self.self_signed = self_signed;
        self
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::config(format!("invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `APPWRITE_ENDPOINT`, `APPWRITE_PROJECT`, `APPWRITE_API_KEY` and
    /// `APPWRITE_SELF_SIGNED`.
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("APPWRITE_ENDPOINT")
            .map_err(|_| Error::config("APPWRITE_ENDPOINT is not set"))?;
        let project = std::env::var("APPWRITE_PROJECT")
            .map_err(|_| Error::config("APPWRITE_PROJECT is not set"))?;
        let mut config = Self::new(endpoint, project);
        config.api_key = std::env::var("APPWRITE_API_KEY").ok().filter(|k| !k.is_empty());
        config.self_signed = std::env::var("APPWRITE_SELF_SIGNED")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(Error::config(format!(
                "endpoint must be an http(s) URL, got {}",
                self.endpoint
            )));
        }
        if self.project_id.trim().is_empty() {
            return Err(Error::config("project_id is empty"));
        }
        Ok(())
    }

    /// REST endpoint with exactly one trailing slash.
    pub fn endpoint(&self) -> String {
        format!("{}/", self.endpoint.trim_end_matches('/'))
    }

    /// Realtime endpoint, e.g. `wss://cloud.example.com/v1/realtime`.
    pub fn realtime_url(&self) -> String {
        if let Some(explicit) = &self.realtime_endpoint {
            return explicit.trim_end_matches('/').to_string();
        }
        let endpoint = self.endpoint();
        let ws = if let Some(rest) = endpoint.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = endpoint.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            endpoint
        };
        format!("{}realtime", ws)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs.max(1))
    }

    /// Default headers for calls made under `role`.
    pub fn base_headers(&self, role: Role) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_PROJECT, HeaderValue::from_str(&self.project_id)?);
        headers.insert(HEADER_SDK_NAME, HeaderValue::from_static(SDK_NAME));
        headers.insert(HEADER_SDK_VERSION, HeaderValue::from_static(SDK_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        for (name, value) in &self.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("invalid header name {}: {}", name, e)))?;
            headers.insert(name, HeaderValue::from_str(value)?);
        }
        if role == Role::Server {
            let key = self
                .api_key
                .as_deref()
                .ok_or_else(|| Error::contract("server role requires an API key"))?;
            let mut value = HeaderValue::from_str(key)?;
            value.set_sensitive(true);
            headers.insert(HEADER_KEY, value);
        }
        Ok(headers)
    }
}
