//! Fan-out of labeled push events to connected SSE subscribers
//!
//! The subscriber map is the only state shared between connection handlers and the
//! broadcaster, and every access goes through its mutex. The lock is never held across
//! an `.await`: delivery uses `try_send`, so one slow or departed subscriber cannot stall
//! the others.

use std::{
    collections::HashMap,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    task::{Context, Poll},
    time::Duration,
};

use chrono::{SecondsFormat, Utc};
use futures::Stream;
use serde_json::{json, Value};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const UPDATE_EVENT: &str = "update";

const SUBSCRIBER_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub label: String,
    pub payload: Value,
}

impl PushEvent {
    pub fn new(label: impl Into<String>, payload: Value) -> Self {
        Self {
            label: label.into(),
            payload,
        }
    }
}

#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<PushEvent>>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. It stays registered until the returned stream is dropped.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.lock().insert(id, tx);
        debug!(subscriber = id, "event subscriber registered");

        Subscription {
            id,
            receiver: rx,
            hub: Arc::clone(self),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Best-effort delivery to every current subscriber. Returns how many accepted it.
    pub fn broadcast(&self, event: PushEvent) -> usize {
        let subscribers = self.lock();
        let mut delivered = 0;

        for (id, sender) in subscribers.iter() {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => debug!(subscriber = id, error = %err, "event delivery skipped"),
            }
        }

        delivered
    }

    fn unsubscribe(&self, id: u64) {
        if self.lock().remove(&id).is_some() {
            debug!(subscriber = id, "event subscriber removed");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::Sender<PushEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<PushEvent>,
    hub: Arc<EventHub>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Stream for Subscription {
    type Item = PushEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

/// Spawns the periodic `update` broadcaster. It runs until `shutdown` is cancelled.
pub fn spawn_event_ticker(
    hub: Arc<EventHub>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        let mut count: u64 = 0;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    count += 1;
                    let delivered = hub.broadcast(PushEvent::new(
                        UPDATE_EVENT,
                        json!({
                            "message": format!("Event #{count}"),
                            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                        }),
                    ));
                    debug!(count, delivered, "update event broadcast");
                }
            }
        }

        info!(sent = count, "event ticker stopped");
    })
}
