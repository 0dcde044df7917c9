//! Live view tests with in-process HTTP and realtime fakes.

use appwrite_bridge::realtime::reconnected_event;
use appwrite_bridge::transport::{
    HttpTransport, TransportError, TransportRequest, TransportResponse,
};
use appwrite_bridge::{
    Client, ClientConfig, Document, Error, RealtimeEvent, RealtimeTransport, Subscription,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    title: String,
    rev: u64,
}

/// Serves one document and its collection from memory.
#[derive(Default)]
struct DocumentStore {
    current: Mutex<Option<Note>>,
    fetches: AtomicUsize,
    fail_from: Mutex<Option<usize>>,
    delay: Mutex<Duration>,
    /// Overwrite `rev` with the fetch index.
    stamp_fetches: std::sync::atomic::AtomicBool,
}

impl DocumentStore {
    fn set(&self, note: Option<Note>) {
        *self.current.lock() = note;
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn document_json(note: &Note) -> Value {
        json!({
            "$id": "a1",
            "$collectionId": "c1",
            "$databaseId": "d1",
            "$createdAt": "",
            "$updatedAt": "",
            "$permissions": [],
            "title": note.title,
            "rev": note.rev
        })
    }
}

#[async_trait]
impl HttpTransport for DocumentStore {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let fetch = self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_from.lock().is_some_and(|from| fetch >= from) {
            return Ok(respond(500, json!({"message": "boom", "code": 500})));
        }
        let current = self.current.lock().clone();
        let listing = request.path.ends_with("/documents");
        Ok(match (listing, current) {
            (true, current) => {
                let documents: Vec<Value> = current.iter().map(Self::document_json).collect();
                respond(200, json!({"total": documents.len(), "documents": documents}))
            }
            (false, Some(mut note)) => {
                if self.stamp_fetches.load(Ordering::SeqCst) {
                    note.rev = fetch as u64;
                }
                respond(200, Self::document_json(&note))
            }
            (false, None) => respond(
                404,
                json!({"message": "Document not found", "code": 404, "type": "document_not_found"}),
            ),
        })
    }
}

fn respond(status: u16, body: Value) -> TransportResponse {
    TransportResponse {
        status: StatusCode::from_u16(status).unwrap(),
        body: Bytes::from(body.to_string()),
    }
}

/// The test's end of one subscription.
struct OpenSubscription {
    channels: Vec<String>,
    events: mpsc::Sender<RealtimeEvent<Value>>,
    closed: oneshot::Receiver<()>,
}

impl OpenSubscription {
    async fn notify(&self) {
        self.events
            .send(RealtimeEvent {
                events: vec!["databases.d1.collections.c1.documents.a1.update".into()],
                channels: self.channels.clone(),
                timestamp: "0".into(),
                payload: json!({"$id": "a1"}),
            })
            .await
            .unwrap();
    }

    async fn announce_reconnect(&self) {
        self.events
            .send(reconnected_event(&self.channels))
            .await
            .unwrap();
    }
}

#[derive(Default)]
struct FakeRealtime {
    opened: Mutex<Vec<OpenSubscription>>,
}

impl FakeRealtime {
    async fn wait_for_subscription(&self) -> OpenSubscription {
        tokio::time::timeout(TIMEOUT, async {
            loop {
                if let Some(open) = self.opened.lock().pop() {
                    return open;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("live view never subscribed")
    }
}

#[async_trait]
impl RealtimeTransport for FakeRealtime {
    async fn subscribe(&self, channels: Vec<String>) -> appwrite_bridge::Result<Subscription> {
        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.opened.lock().push(OpenSubscription {
            channels: channels.clone(),
            events: tx,
            closed: shutdown_rx,
        });
        Ok(Subscription::new(channels, rx, shutdown_tx))
    }
}

fn setup() -> (Client, Arc<DocumentStore>, Arc<FakeRealtime>) {
    let store = Arc::new(DocumentStore::default());
    let realtime = Arc::new(FakeRealtime::default());
    let client = Client::builder(ClientConfig::new("http://localhost/v1", "p1"))
        .client_transport(store.clone())
        .realtime(realtime.clone())
        .build()
        .unwrap();
    (client, store, realtime)
}

fn note(rev: u64) -> Note {
    Note {
        title: "X".into(),
        rev,
    }
}

async fn next<S: futures::Stream + Unpin>(stream: &mut S) -> Option<S::Item> {
    tokio::time::timeout(TIMEOUT, stream.next())
        .await
        .expect("timed out waiting for a snapshot")
}

async fn assert_quiet<S: futures::Stream + Unpin>(stream: &mut S) {
    let extra = tokio::time::timeout(Duration::from_millis(100), stream.next()).await;
    assert!(extra.is_err(), "unexpected extra emission");
}

#[tokio::test]
async fn one_notification_yields_exactly_two_emissions() {
    let (client, store, realtime) = setup();
    store.set(Some(note(1)));

    let mut view = client.databases().live_document::<Note>("d1", "c1", "a1");
    let first: Option<Document<Note>> = next(&mut view).await.unwrap().unwrap();
    assert_eq!(first.unwrap().data, note(1));

    let sub = realtime.wait_for_subscription().await;
    assert_eq!(
        sub.channels,
        vec!["databases.d1.collections.c1.documents.a1"]
    );

    store.set(Some(note(2)));
    sub.notify().await;
    let second = next(&mut view).await.unwrap().unwrap();
    assert_eq!(second.unwrap().data, note(2));

    assert_quiet(&mut view).await;
    assert_eq!(store.fetches(), 2);
}

#[tokio::test]
async fn missing_document_is_none_and_the_view_survives() {
    let (client, store, realtime) = setup();

    let mut view = client.databases().live_document::<Note>("d1", "c1", "a1");
    assert_eq!(next(&mut view).await.unwrap().unwrap(), None);
    let sub = realtime.wait_for_subscription().await;

    store.set(Some(note(1)));
    sub.notify().await;
    let created = next(&mut view).await.unwrap().unwrap().unwrap();
    assert_eq!(created.id, "a1");
    assert_eq!(created.data, note(1));

    store.set(None);
    sub.notify().await;
    assert_eq!(next(&mut view).await.unwrap().unwrap(), None);

    store.set(Some(note(2)));
    sub.notify().await;
    let recreated = next(&mut view).await.unwrap().unwrap().unwrap();
    assert_eq!(recreated.data, note(2));
}

#[tokio::test]
async fn burst_of_notifications_is_emitted_in_order() {
    let (client, store, realtime) = setup();
    store.set(Some(note(0)));
    store.stamp_fetches.store(true, Ordering::SeqCst);
    *store.delay.lock() = Duration::from_millis(20);

    let mut view = client.databases().live_document::<Note>("d1", "c1", "a1");
    let first = next(&mut view).await.unwrap().unwrap().unwrap();
    assert_eq!(first.data.rev, 0);
    let sub = realtime.wait_for_subscription().await;

    for _ in 0..3 {
        sub.notify().await;
    }
    let mut revs = Vec::new();
    for _ in 0..3 {
        revs.push(next(&mut view).await.unwrap().unwrap().unwrap().data.rev);
    }
    assert_eq!(revs, vec![1, 2, 3]);
    assert_quiet(&mut view).await;
    assert_eq!(store.fetches(), 4);
}

#[tokio::test]
async fn change_during_the_initial_fetch_is_not_missed() {
    let (client, store, realtime) = setup();
    store.set(Some(note(0)));
    store.stamp_fetches.store(true, Ordering::SeqCst);
    *store.delay.lock() = Duration::from_millis(200);

    let mut view = client.databases().live_document::<Note>("d1", "c1", "a1");
    let sub = realtime.wait_for_subscription().await;
    sub.notify().await;

    let first = next(&mut view).await.unwrap().unwrap().unwrap();
    assert_eq!(first.data.rev, 0);
    let second = next(&mut view).await.unwrap().unwrap().unwrap();
    assert_eq!(second.data.rev, 1);
    assert_eq!(store.fetches(), 2);
}

#[tokio::test]
async fn reconnect_triggers_a_refetch() {
    let (client, store, realtime) = setup();
    store.set(Some(note(1)));

    let mut view = client.databases().live_document::<Note>("d1", "c1", "a1");
    next(&mut view).await.unwrap().unwrap();
    let sub = realtime.wait_for_subscription().await;

    store.set(Some(note(2)));
    sub.announce_reconnect().await;
    let caught_up = next(&mut view).await.unwrap().unwrap().unwrap();
    assert_eq!(caught_up.data, note(2));
    assert_quiet(&mut view).await;
}

#[tokio::test]
async fn dropping_the_view_closes_the_subscription() {
    let (client, store, realtime) = setup();
    store.set(Some(note(1)));

    let mut view = client.databases().live_document::<Note>("d1", "c1", "a1");
    next(&mut view).await.unwrap().unwrap();
    let sub = realtime.wait_for_subscription().await;

    drop(view);
    tokio::time::timeout(TIMEOUT, sub.closed)
        .await
        .expect("subscription left open")
        .ok();
    tokio::time::timeout(TIMEOUT, sub.events.closed())
        .await
        .expect("event channel left open");
    assert_eq!(store.fetches(), 1);
}

#[tokio::test]
async fn other_fetch_errors_end_the_view() {
    let (client, store, realtime) = setup();
    store.set(Some(note(1)));
    *store.fail_from.lock() = Some(1);

    let mut view = client.databases().live_document::<Note>("d1", "c1", "a1");
    next(&mut view).await.unwrap().unwrap();
    let sub = realtime.wait_for_subscription().await;

    sub.notify().await;
    let err = next(&mut view).await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Backend(ref e) if e.code == 500));
    assert!(next(&mut view).await.is_none());
}

#[tokio::test]
async fn live_list_refetches_the_whole_collection() {
    let (client, store, realtime) = setup();

    let mut view = client
        .databases()
        .live_documents::<Note>("d1", "c1", Vec::new());
    let empty = next(&mut view).await.unwrap().unwrap();
    assert_eq!(empty.total, 0);

    let sub = realtime.wait_for_subscription().await;
    assert_eq!(sub.channels, vec!["databases.d1.collections.c1.documents"]);

    store.set(Some(note(7)));
    sub.notify().await;
    let list = next(&mut view).await.unwrap().unwrap();
    assert_eq!(list.total, 1);
    assert_eq!(list.documents[0].data, note(7));
}

#[tokio::test]
async fn generic_live_view_runs_any_fetch() {
    let (client, _, realtime) = setup();
    let counter = Arc::new(AtomicUsize::new(0));
    let fetch_counter = counter.clone();

    let mut view = client.live(vec!["account".to_string()], move || {
        let counter = fetch_counter.clone();
        async move { Ok::<_, Error>(counter.fetch_add(1, Ordering::SeqCst)) }
    });
    assert_eq!(view.next_snapshot().await.unwrap().unwrap(), 0);
    let sub = realtime.wait_for_subscription().await;
    sub.notify().await;
    assert_eq!(view.next_snapshot().await.unwrap().unwrap(), 1);
    view.close();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
