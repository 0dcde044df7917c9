//! WebSocket realtime transport against a local axum socket.

use appwrite_bridge::realtime::WebSocketRealtime;
use appwrite_bridge::transport::TransportError;
use appwrite_bridge::{Error, RealtimeTransport, RECONNECTED_EVENT};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

const TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("appwrite_bridge=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[derive(Clone, Default)]
struct SocketState {
    connections: Arc<AtomicUsize>,
    pings: Arc<AtomicUsize>,
    last_query: Arc<Mutex<Vec<(String, String)>>>,
    /// Hang up the first connection right after its event.
    drop_first: Arc<AtomicBool>,
    closed: Arc<Notify>,
}

async fn realtime(
    ws: WebSocketUpgrade,
    Query(query): Query<Vec<(String, String)>>,
    State(state): State<SocketState>,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, query, state))
}

fn event_envelope(rev: usize) -> String {
    json!({
        "type": "event",
        "data": {
            "events": ["databases.d1.collections.c1.documents.a1.update"],
            "channels": ["databases.d1.collections.c1.documents"],
            "timestamp": 1714557600,
            "payload": {"$id": "a1", "rev": rev}
        }
    })
    .to_string()
}

async fn serve_socket(mut socket: WebSocket, query: Vec<(String, String)>, state: SocketState) {
    let connection = state.connections.fetch_add(1, Ordering::SeqCst);
    *state.last_query.lock() = query;

    let connected = json!({"type": "connected", "data": {"channels": [], "user": null}});
    if socket
        .send(Message::Text(connected.to_string()))
        .await
        .is_err()
    {
        return;
    }
    if socket
        .send(Message::Text(event_envelope(connection)))
        .await
        .is_err()
    {
        return;
    }
    if connection == 0 && state.drop_first.load(Ordering::SeqCst) {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) if text.contains("\"ping\"") => {
                state.pings.fetch_add(1, Ordering::SeqCst);
                let pong = json!({"type": "pong"}).to_string();
                if socket.send(Message::Text(pong)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    state.closed.notify_one();
}

async fn start_test_server() -> (SocketAddr, SocketState) {
    init_tracing();
    let state = SocketState::default();
    let app = Router::new()
        .route("/v1/realtime", get(realtime))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, state)
}

fn transport(addr: SocketAddr, heartbeat: Duration) -> WebSocketRealtime {
    WebSocketRealtime::new(
        format!("ws://{}/v1/realtime", addr),
        "p1",
        heartbeat,
        Duration::from_millis(50),
    )
}

#[tokio::test]
async fn subscription_receives_events_for_its_channels() {
    let (addr, state) = start_test_server().await;
    let realtime = transport(addr, Duration::from_secs(20));

    let mut sub = realtime
        .subscribe(vec!["databases.d1.collections.c1.documents".to_string()])
        .await
        .unwrap();
    let event = tokio::time::timeout(TIMEOUT, sub.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.payload["$id"], "a1");
    assert_eq!(event.timestamp, "1714557600");
    assert_eq!(
        event.channels,
        vec!["databases.d1.collections.c1.documents"]
    );

    let query = state.last_query.lock().clone();
    assert_eq!(
        query,
        vec![
            ("project".to_string(), "p1".to_string()),
            (
                "channels[]".to_string(),
                "databases.d1.collections.c1.documents".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn heartbeat_pings_keep_flowing() {
    let (addr, state) = start_test_server().await;
    let realtime = transport(addr, Duration::from_millis(100));

    let mut sub = realtime.subscribe(vec!["account".to_string()]).await.unwrap();
    tokio::time::timeout(TIMEOUT, sub.next()).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(state.pings.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn dropping_the_subscription_closes_the_socket() {
    let (addr, state) = start_test_server().await;
    let realtime = transport(addr, Duration::from_secs(20));

    let mut sub = realtime.subscribe(vec!["account".to_string()]).await.unwrap();
    tokio::time::timeout(TIMEOUT, sub.next()).await.unwrap().unwrap();

    let closed = state.closed.notified();
    drop(sub);
    tokio::time::timeout(TIMEOUT, closed)
        .await
        .expect("socket left open after drop");
}

#[tokio::test]
async fn dropped_connection_is_reopened() {
    let (addr, state) = start_test_server().await;
    state.drop_first.store(true, Ordering::SeqCst);
    let realtime = transport(addr, Duration::from_secs(20));

    let mut sub = realtime.subscribe(vec!["account".to_string()]).await.unwrap();
    let first = tokio::time::timeout(TIMEOUT, sub.next()).await.unwrap().unwrap();
    assert_eq!(first.payload["rev"], 0);

    let reconnected = tokio::time::timeout(TIMEOUT, sub.next()).await.unwrap().unwrap();
    assert_eq!(reconnected.events, vec![RECONNECTED_EVENT]);
    assert_eq!(reconnected.channels, vec!["account"]);

    let second = tokio::time::timeout(TIMEOUT, sub.next()).await.unwrap().unwrap();
    assert_eq!(second.payload["rev"], 1);
    assert_eq!(state.connections.load(Ordering::SeqCst), 2);
}

/// Accepts TCP connections and never answers the handshake. Each held
/// socket reports on `hung_up` once the client closes it.
async fn start_silent_server(complete_first: bool) -> (SocketAddr, Arc<Notify>, Arc<Notify>) {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(Notify::new());
    let hung_up = Arc::new(Notify::new());
    let (accepted_tx, hung_up_tx) = (accepted.clone(), hung_up.clone());
    tokio::spawn(async move {
        let mut first = complete_first;
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            if first {
                first = false;
                let socket = tokio_tungstenite::accept_async(stream).await.unwrap();
                drop(socket);
                continue;
            }
            accepted_tx.notify_one();
            let hung_up = hung_up_tx.clone();
            tokio::spawn(hold_until_closed(stream, hung_up));
        }
    });
    (addr, accepted, hung_up)
}

async fn hold_until_closed(mut stream: TcpStream, hung_up: Arc<Notify>) {
    let mut buf = [0u8; 1024];
    while let Ok(n) = stream.read(&mut buf).await {
        if n == 0 {
            break;
        }
    }
    hung_up.notify_one();
}

#[tokio::test]
async fn stalled_handshake_times_out() {
    let (addr, _, _) = start_silent_server(false).await;
    let realtime = transport(addr, Duration::from_secs(20))
        .with_connect_timeout(Duration::from_millis(200));

    let err = tokio::time::timeout(TIMEOUT, realtime.subscribe(vec!["account".to_string()]))
        .await
        .expect("subscribe outlived its connect timeout")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::NoConnectivity {
            cause: Some(TransportError::Timeout)
        }
    ));
}

#[tokio::test]
async fn dropping_the_subscription_cancels_a_pending_reconnect() {
    let (addr, accepted, hung_up) = start_silent_server(true).await;
    let realtime = transport(addr, Duration::from_secs(20))
        .with_connect_timeout(Duration::from_secs(30));

    let sub = realtime.subscribe(vec!["account".to_string()]).await.unwrap();
    tokio::time::timeout(TIMEOUT, accepted.notified())
        .await
        .expect("no reconnect attempt");

    let closed = hung_up.notified();
    drop(sub);
    tokio::time::timeout(TIMEOUT, closed)
        .await
        .expect("reconnect kept running after drop");
}

#[tokio::test]
async fn unreachable_endpoint_is_no_connectivity() {
    init_tracing();
    let realtime = WebSocketRealtime::new(
        "ws://127.0.0.1:1/v1/realtime",
        "p1",
        Duration::from_secs(20),
        Duration::from_secs(5),
    );
    let err = realtime
        .subscribe(vec!["account".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoConnectivity { .. }));

    let err = realtime.subscribe(Vec::new()).await.unwrap_err();
    assert!(matches!(err, Error::Contract(_)));
}
