//! Live views.
//!
//! A live view fetches once and emits, then re-fetches the full state on
//! every notification. The subscription is opened while the initial fetch
//! is in flight, so a change landing during that fetch still triggers a
//! re-fetch, without holding back the first snapshot. Snapshots are
//! emitted one at a time in notification order; notifications that arrive
//! during a re-fetch wait for it to finish.

use super::RealtimeTransport;
use crate::client::Client;
use crate::error::Result;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Snapshots buffered before the view's task waits for the consumer.
pub const LIVE_VIEW_BUFFER: usize = 16;

/// A stream of snapshots. Dropping it cancels the background task and
/// closes the subscription.
///
/// A fetch error is delivered as the last item.
pub struct LiveView<T> {
    snapshots: mpsc::Receiver<Result<T>>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> LiveView<T> {
    /// Spawn a view over `channels` that emits `fetch()` on activation and
    /// after every notification.
    pub fn spawn<F, Fut>(realtime: Arc<dyn RealtimeTransport>, channels: Vec<String>, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(LIVE_VIEW_BUFFER);
        let task = tokio::spawn(run_view(realtime, channels, fetch, tx));
        Self {
            snapshots: rx,
            task,
        }
    }
}

impl<T> LiveView<T> {
    pub async fn next_snapshot(&mut self) -> Option<Result<T>> {
        self.snapshots.recv().await
    }

    pub fn close(self) {}
}

impl<T> Stream for LiveView<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.snapshots.poll_recv(cx)
    }
}

impl<T> Drop for LiveView<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_view<T, F, Fut>(
    realtime: Arc<dyn RealtimeTransport>,
    channels: Vec<String>,
    fetch: F,
    tx: mpsc::Sender<Result<T>>,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut opening = realtime.subscribe(channels);
    let initial = fetch();
    tokio::pin!(initial);
    let mut opened = None;
    let snapshot = loop {
        tokio::select! {
            snapshot = &mut initial => break snapshot,
            subscription = &mut opening, if opened.is_none() => opened = Some(subscription),
        }
    };
    if !emit(&tx, snapshot).await {
        return;
    }

    let opened = match opened {
        Some(opened) => opened,
        None => opening.await,
    };
    let mut subscription = match opened {
        Ok(subscription) => subscription,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = tx.closed() => return,
            event = subscription.next() => match event {
                Some(event) => {
                    debug!(events = ?event.events, "change notification, re-fetching");
                    if !emit(&tx, fetch().await).await {
                        return;
                    }
                }
                None => {
                    debug!(channels = ?subscription.channels(), "subscription ended");
                    return;
                }
            }
        }
    }
}

/// Deliver a snapshot. False once the view should stop.
async fn emit<T>(tx: &mpsc::Sender<Result<T>>, snapshot: Result<T>) -> bool {
    let failed = snapshot.is_err();
    tx.send(snapshot).await.is_ok() && !failed
}

impl Client {
    /// Live view over `channels` re-running `fetch` on every notification.
    pub fn live<T, F, Fut>(&self, channels: Vec<String>, fetch: F) -> LiveView<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        LiveView::spawn(self.realtime(), channels, fetch)
    }
}
