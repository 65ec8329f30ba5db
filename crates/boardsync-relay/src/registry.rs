use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// A serialized event, shared by every subscriber it is delivered to.
pub type Frame = Arc<str>;

/// Unique subscriber identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub String);

impl Default for SubscriberId {
    fn default() -> Self {
        Self(format!("sub_{}", Uuid::now_v7()))
    }
}

impl SubscriberId {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a frame could not be handed to a subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("subscriber connection closed")]
    Closed,
    #[error("subscriber send queue full")]
    Lagging,
}

/// Outcome of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub evicted: usize,
}

/// Registry of live streaming subscribers.
pub struct SubscriberRegistry {
    subscribers: DashMap<SubscriberId, mpsc::Sender<Frame>>,
    max_send_queue: usize,
}

impl SubscriberRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            max_send_queue: max_send_queue.max(1),
        }
    }

    /// Register a new subscriber whose stream starts with `first`.
    ///
    /// `first` is queued before the subscriber becomes visible to
    /// `broadcast`, so it is always the first frame the stream yields.
    pub fn register(self: &Arc<Self>, first: Option<Frame>) -> Subscription {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        if let Some(first) = first {
            if tx.try_send(first).is_err() {
                warn!(subscriber_id = %id, "failed to queue initial frame");
            }
        }
        self.subscribers.insert(id.clone(), tx);
        debug!(subscriber_id = %id, total = self.count(), "subscriber registered");

        Subscription {
            id,
            rx,
            registry: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber. Safe to call more than once.
    pub fn unregister(&self, id: &SubscriberId) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            debug!(subscriber_id = %id, total = self.count(), "subscriber removed");
        }
        removed
    }

    /// Deliver `frame` to every subscriber registered right now.
    ///
    /// Sends never block. A subscriber whose channel is closed or full is
    /// removed after the pass; dropping its sender ends its stream once the
    /// already queued frames are drained.
    pub fn broadcast(&self, frame: &Frame) -> BroadcastReport {
        let targets: Vec<(SubscriberId, mpsc::Sender<Frame>)> = self
            .subscribers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(Arc::clone(frame)) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => failed.push((id, DeliveryError::Lagging)),
                Err(mpsc::error::TrySendError::Closed(_)) => failed.push((id, DeliveryError::Closed)),
            }
        }

        for (id, error) in failed {
            if self.unregister(&id) {
                report.evicted += 1;
                warn!(subscriber_id = %id, %error, "evicted subscriber");
            }
        }
        report
    }

    /// Drop every subscriber, ending all streams.
    pub fn clear(&self) -> usize {
        let count = self.subscribers.len();
        self.subscribers.clear();
        count
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    /// Number of registered subscribers.
    pub fn count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Receiving half of one subscriber.
///
/// Yields frames until the registry drops the subscriber. Dropping it
/// deregisters the subscriber.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Frame>,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(&self.id);
        }
    }
}
