//! Realtime bridge.
//!
//! - `websocket.rs` holds the WebSocket subscription transport
//! - `live.rs` turns subscriptions into live views that re-fetch on change

pub mod live;
pub mod websocket;

pub use live::{LiveView, LIVE_VIEW_BUFFER};
pub use websocket::WebSocketRealtime;

use crate::error::Result;
use appwrite_types::RealtimeEvent;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

/// Event name of the notification a transport emits after re-opening a
/// dropped connection. Changes made during the outage were not delivered,
/// so consumers should treat it like any other change.
pub const RECONNECTED_EVENT: &str = "realtime.reconnected";

/// Synthetic notification for [`RECONNECTED_EVENT`] on `channels`.
pub fn reconnected_event(channels: &[String]) -> RealtimeEvent<Value> {
    RealtimeEvent {
        events: vec![RECONNECTED_EVENT.to_string()],
        channels: channels.to_vec(),
        timestamp: String::new(),
        payload: Value::Null,
    }
}

/// Opens channel subscriptions. One call, one subscription.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    async fn subscribe(&self, channels: Vec<String>) -> Result<Subscription>;
}

/// An open subscription. Dropping it closes the underlying connection.
pub struct Subscription {
    channels: Vec<String>,
    events: mpsc::Receiver<RealtimeEvent<Value>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Subscription {
    /// `shutdown` fires when the subscription is closed or dropped.
    pub fn new(
        channels: Vec<String>,
        events: mpsc::Receiver<RealtimeEvent<Value>>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self {
            channels,
            events,
            shutdown: Some(shutdown),
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Next notification, or `None` once the connection is gone for good.
    pub async fn next(&mut self) -> Option<RealtimeEvent<Value>> {
        self.events.recv().await
    }

    pub fn close(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            tracing::debug!(channels = ?self.channels, "subscription closed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}
