//! WebSocket realtime transport.
//!
//! Each subscription owns one socket at
//! `{realtime}?project={id}&channels[]={channel}...`. The server speaks
//! JSON envelopes `{"type": ..., "data": ...}`; only `event` envelopes are
//! forwarded. A dropped socket is re-opened after a fixed delay until the
//! subscription is closed, and every successful re-open is announced with a
//! [`RECONNECTED_EVENT`] notification since events sent during the outage
//! are lost.

use super::{reconnected_event, RealtimeTransport, Subscription, RECONNECTED_EVENT};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::transport::TransportError;
use appwrite_types::RealtimeEvent;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Buffered notifications per subscription before the socket task waits.
const EVENT_BUFFER: usize = 64;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const PING: &str = r#"{"type":"ping"}"#;

#[derive(Debug, Clone)]
pub struct WebSocketRealtime {
    url: String,
    project: String,
    heartbeat: Duration,
    reconnect_delay: Duration,
    connect_timeout: Duration,
}

impl WebSocketRealtime {
    pub fn new(
        url: impl Into<String>,
        project: impl Into<String>,
        heartbeat: Duration,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            project: project.into(),
            heartbeat,
            reconnect_delay,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.realtime_url(),
            config.project_id.clone(),
            config.heartbeat(),
            config.reconnect_delay(),
        )
        .with_connect_timeout(config.timeouts.connect())
    }

    /// Bound on each handshake, initial and reconnect alike.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Connection URL for `channels`.
    pub fn subscription_url(&self, channels: &[String]) -> String {
        let mut url = format!("{}?project={}", self.url, urlencoding::encode(&self.project));
        for channel in channels {
            url.push_str("&channels%5B%5D=");
            url.push_str(&urlencoding::encode(channel));
        }
        url
    }
}

#[async_trait]
impl RealtimeTransport for WebSocketRealtime {
    async fn subscribe(&self, channels: Vec<String>) -> Result<Subscription> {
        if channels.is_empty() {
            return Err(Error::contract("subscribe needs at least one channel"));
        }
        let url = self.subscription_url(&channels);
        info!("Connecting to realtime: {}", url);
        let socket = connect(&url, self.connect_timeout).await.map_err(|e| {
            warn!("Realtime connect failed: {}", e);
            e
        })?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(pump(
            socket,
            Reconnect {
                url,
                channels: channels.clone(),
                delay: self.reconnect_delay,
                connect_timeout: self.connect_timeout,
            },
            self.heartbeat,
            tx,
            shutdown_rx,
        ));
        Ok(Subscription::new(channels, rx, shutdown_tx))
    }
}

/// Open one socket, giving up after `limit`.
async fn connect(url: &str, limit: Duration) -> Result<Socket> {
    match timeout(limit, connect_async(url)).await {
        Ok(Ok((socket, _))) => Ok(socket),
        Ok(Err(WsError::Url(e))) => Err(Error::Realtime(format!("invalid realtime URL: {}", e))),
        Ok(Err(other)) => Err(Error::NoConnectivity {
            cause: Some(TransportError::Connect(other.to_string())),
        }),
        Err(_) => Err(Error::NoConnectivity {
            cause: Some(TransportError::Timeout),
        }),
    }
}

struct Reconnect {
    url: String,
    channels: Vec<String>,
    delay: Duration,
    connect_timeout: Duration,
}

impl Reconnect {
    /// Wait out the delay, then try once.
    async fn attempt(&self) -> Result<Socket> {
        sleep(self.delay).await;
        connect(&self.url, self.connect_timeout).await
    }
}

enum ConnectionEnd {
    Closed,
    Dropped,
}

async fn pump(
    mut socket: Socket,
    reconnect: Reconnect,
    heartbeat: Duration,
    tx: mpsc::Sender<RealtimeEvent<Value>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        match run_connection(&mut socket, heartbeat, &tx, &mut shutdown).await {
            ConnectionEnd::Closed => {
                debug!("Realtime subscription closed: {}", reconnect.url);
                return;
            }
            ConnectionEnd::Dropped => {
                warn!(
                    "Realtime connection dropped, reconnecting in {:?}",
                    reconnect.delay
                );
            }
        }

        loop {
            let attempt = tokio::select! {
                _ = &mut shutdown => return,
                _ = tx.closed() => return,
                attempt = reconnect.attempt() => attempt,
            };
            match attempt {
                Ok(reconnected) => {
                    info!("Realtime reconnected: {}", reconnect.url);
                    socket = reconnected;
                    break;
                }
                Err(e) => warn!("Realtime reconnect failed: {}", e),
            }
        }

        debug!(event = RECONNECTED_EVENT, "announcing reconnect");
        if tx.send(reconnected_event(&reconnect.channels)).await.is_err() {
            let _ = socket.close(None).await;
            return;
        }
    }
}

async fn run_connection(
    socket: &mut Socket,
    heartbeat: Duration,
    tx: &mpsc::Sender<RealtimeEvent<Value>>,
    shutdown: &mut oneshot::Receiver<()>,
) -> ConnectionEnd {
    let mut ticker = tokio::time::interval_at(Instant::now() + heartbeat, heartbeat);
    loop {
        tokio::select! {
            _ = &mut *shutdown => {
                let _ = socket.close(None).await;
                return ConnectionEnd::Closed;
            }
            _ = tx.closed() => {
                let _ = socket.close(None).await;
                return ConnectionEnd::Closed;
            }
            _ = ticker.tick() => {
                if let Err(e) = socket.send(Message::Text(PING.into())).await {
                    warn!("Realtime heartbeat failed: {}", e);
                    return ConnectionEnd::Dropped;
                }
            }
            message = socket.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = parse_envelope(&text) {
                        if tx.send(event).await.is_err() {
                            let _ = socket.close(None).await;
                            return ConnectionEnd::Closed;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return ConnectionEnd::Dropped,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Realtime socket error: {}", e);
                    return ConnectionEnd::Dropped;
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Extract the notification carried by an `event` envelope.
fn parse_envelope(text: &str) -> Option<RealtimeEvent<Value>> {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Malformed realtime message: {}", e);
            return None;
        }
    };
    match envelope.kind.as_str() {
        "event" => match serde_json::from_value(envelope.data) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Malformed realtime event: {}", e);
                None
            }
        },
        "error" => {
            let message = envelope
                .data
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            warn!("Realtime server error: {}", message);
            None
        }
        "connected" => {
            debug!("Realtime connected: {}", envelope.data);
            None
        }
        other => {
            trace!("Realtime {} message ignored", other);
            None
        }
    }
}
