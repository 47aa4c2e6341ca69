//! Subscribers pool: stream-based delivery path.
//!
//! Each subscriber owns a bounded channel. Delivery to a subscriber is bounded
//! by `delivery_timeout`; a subscriber that times out or has dropped its
//! stream is removed and its channel closed.
//!
//! The pool is fed from the registry path by a [`PoolForwarder`] handler,
//! one per key. The forwarder asks to be removed once the key has no
//! subscribers left, which lets the router send the unsubscribe frame.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{EventHandler, NotificationConfig};

/// Unique subscriber identifier within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Subscriber<T> {
    id: SubscriberId,
    tx: mpsc::Sender<Arc<T>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

struct Slot<T> {
    subscribers: Vec<Subscriber<T>>,
    /// A forwarder handler is registered for this key.
    forwarded: bool,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
            forwarded: false,
        }
    }
}

/// Key → subscriber channels for one event kind.
pub struct SubscribersPool<T> {
    slots: DashMap<String, Slot<T>>,
    capacity: usize,
    delivery_timeout: Duration,
}

impl<T: Send + Sync + 'static> SubscribersPool<T> {
    /// `capacity` is the per-subscriber buffer; zero is raised to one.
    pub fn new(capacity: usize, delivery_timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            capacity: capacity.max(1),
            delivery_timeout,
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.stream_capacity, config.delivery_timeout)
    }

    /// Open a new stream for `key`.
    pub fn subscribe(&self, key: &str) -> EventStream<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = SubscriberId::new();
        self.slots
            .entry(key.to_string())
            .or_default()
            .subscribers
            .push(Subscriber { id, tx });
        debug!(key, subscriber = %id, "Stream subscribed");

        EventStream {
            id,
            key: key.to_string(),
            inner: ReceiverStream::new(rx),
        }
    }

    /// Remove one subscriber. Returns whether it was present.
    pub fn unsubscribe(&self, key: &str, id: SubscriberId) -> bool {
        let removed = match self.slots.get_mut(key) {
            Some(mut slot) => {
                let before = slot.subscribers.len();
                slot.subscribers.retain(|s| s.id != id);
                before != slot.subscribers.len()
            }
            None => false,
        };
        self.slots
            .remove_if(key, |_, slot| slot.subscribers.is_empty() && !slot.forwarded);
        removed
    }

    /// Deliver `event` to every subscriber of `key` concurrently.
    ///
    /// Returns the number of subscribers that received it. Subscribers that
    /// time out or are closed are removed.
    pub async fn notify(&self, key: &str, event: Arc<T>) -> usize {
        let snapshot: Vec<Subscriber<T>> = match self.slots.get(key) {
            Some(slot) => slot.subscribers.clone(),
            None => return 0,
        };
        if snapshot.is_empty() {
            return 0;
        }

        let timeout = self.delivery_timeout;
        let results = join_all(snapshot.into_iter().map(|subscriber| {
            let event = Arc::clone(&event);
            async move {
                let outcome = subscriber.tx.send_timeout(event, timeout).await;
                (subscriber.id, outcome)
            }
        }))
        .await;

        let mut delivered = 0;
        let mut evicted = Vec::new();
        for (id, outcome) in results {
            match outcome {
                Ok(()) => delivered += 1,
                Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                    warn!(key, subscriber = %id, timeout_ms = timeout.as_millis() as u64, "Subscriber too slow, dropped");
                    evicted.push(id);
                }
                Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                    debug!(key, subscriber = %id, "Stream closed, pruned");
                    evicted.push(id);
                }
            }
        }

        if !evicted.is_empty() {
            if let Some(mut slot) = self.slots.get_mut(key) {
                slot.subscribers.retain(|s| !evicted.contains(&s.id));
            }
        }
        delivered
    }

    #[must_use]
    pub fn has_subscribers(&self, key: &str) -> bool {
        self.subscriber_count(key) > 0
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.slots
            .get(key)
            .map_or(0, |slot| slot.subscribers.len())
    }

    /// Mark `key` as forwarded. Returns `true` if the caller must register
    /// the forwarder (none was attached yet).
    pub fn attach_forwarder(&self, key: &str) -> bool {
        let mut slot = self.slots.entry(key.to_string()).or_default();
        !std::mem::replace(&mut slot.forwarded, true)
    }

    /// Clear the forwarder mark of `key`, e.g. after its registration failed.
    pub fn detach_forwarder(&self, key: &str) {
        if let Some(mut slot) = self.slots.get_mut(key) {
            slot.forwarded = false;
        }
        self.slots
            .remove_if(key, |_, slot| slot.subscribers.is_empty() && !slot.forwarded);
    }

    /// Detach the forwarder of `key` if nobody listens any more.
    pub fn detach_if_empty(&self, key: &str) -> bool {
        self.slots
            .remove_if(key, |_, slot| slot.subscribers.is_empty())
            .is_some()
            || !self.slots.contains_key(key)
    }

    /// Drop every subscriber of `key`, closing their streams.
    pub fn clear(&self, key: &str) -> usize {
        self.slots
            .remove(key)
            .map_or(0, |(_, slot)| slot.subscribers.len())
    }
}

/// Receiving side of one pool subscription.
///
/// Yields events until the pool drops the subscriber. Dropping the stream
/// closes its channel; the next `notify` prunes it.
pub struct EventStream<T> {
    id: SubscriberId,
    key: String,
    inner: ReceiverStream<Arc<T>>,
}

impl<T> EventStream<T> {
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn recv(&mut self) -> Option<Arc<T>> {
        self.inner.as_mut().recv().await
    }

    /// Stop receiving. Buffered events can still be read.
    pub fn close(&mut self) {
        self.inner.close();
    }
}

impl<T> Stream for EventStream<T> {
    type Item = Arc<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Registry handler feeding one key of a pool.
pub struct PoolForwarder<T> {
    pool: Arc<SubscribersPool<T>>,
    key: String,
}

impl<T> PoolForwarder<T> {
    pub fn new(pool: Arc<SubscribersPool<T>>, key: impl Into<String>) -> Self {
        Self {
            pool,
            key: key.into(),
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> EventHandler<T> for PoolForwarder<T> {
    async fn handle(&self, event: Arc<T>) -> bool {
        if self.pool.has_subscribers(&self.key) {
            self.pool.notify(&self.key, event).await;
        }
        self.pool.detach_if_empty(&self.key)
    }
}
