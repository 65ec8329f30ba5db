use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use boardsync_core::{parse_update, Document, RelayError, RelayEvent};
use boardsync_store::DurableStore;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::registry::{Frame, SubscriberRegistry, Subscription};
use crate::state::{SharedState, Snapshot};
use crate::stats::{RelayStats, StatsSnapshot};

/// Result of a successfully applied update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateAck {
    pub revision: u64,
    /// The record on disk is at this revision or a newer one.
    pub persisted: bool,
    pub delivered: usize,
}

/// Orchestrates subscribe, update and snapshot reads.
///
/// `sequencer` serializes replace-and-broadcast against each other and
/// against the hello-then-register step of `subscribe`. A subscriber
/// therefore never sees a patch older than its hello, and every subscriber
/// observes updates in the order they were applied. Nothing inside the
/// critical section awaits or touches storage.
///
/// Persistence runs afterwards under `persist_lock`, which remembers the
/// newest revision handed to the store. A save for an older revision is
/// skipped, so the record never moves backwards.
pub struct RelayService {
    state: SharedState,
    registry: Arc<SubscriberRegistry>,
    store: Arc<dyn DurableStore>,
    stats: RelayStats,
    sequencer: Mutex<()>,
    persist_lock: Mutex<u64>,
    closed: AtomicBool,
}

impl RelayService {
    /// Build a relay seeded from whatever `store` holds.
    pub fn new(store: Arc<dyn DurableStore>, max_send_queue: usize) -> Self {
        let initial = store.load();
        info!(has_state = initial.is_some(), "relay initialized");
        Self {
            state: SharedState::new(initial),
            registry: Arc::new(SubscriberRegistry::new(max_send_queue)),
            store,
            stats: RelayStats::default(),
            sequencer: Mutex::new(()),
            persist_lock: Mutex::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Open a subscription. Its first frame is a `hello` with the current
    /// document (or `null`). Fails once `close_all` has run.
    pub fn subscribe(&self) -> Result<Subscription, RelayError> {
        let _seq = self.sequencer.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(RelayError::ShuttingDown);
        }
        let snapshot = self.state.get();
        let hello = encode(RelayEvent::Hello {
            state: snapshot.document.as_deref(),
        });
        let subscription = self.registry.register(hello);
        info!(
            subscriber_id = %subscription.id(),
            revision = snapshot.revision,
            subscribers = self.registry.count(),
            "subscriber connected"
        );
        Ok(subscription)
    }

    /// Validate a raw update body and apply it.
    ///
    /// Only malformed input is an error. Persistence and delivery problems
    /// are logged and counted but do not fail the update.
    pub fn apply_update(&self, body: &[u8]) -> Result<UpdateAck, RelayError> {
        match parse_update(body) {
            Ok(doc) => Ok(self.apply_document(doc)),
            Err(e) => {
                self.stats.record_rejected();
                debug!(error = %e, "rejected update");
                Err(e)
            }
        }
    }

    /// Replace and broadcast an already validated document, then persist it.
    pub fn apply_document(&self, doc: Document) -> UpdateAck {
        let (revision, current, report) = {
            let _seq = self.sequencer.lock();
            let (revision, current) = self.state.replace(doc);
            let report = match encode(RelayEvent::Patch { state: &current }) {
                Some(frame) => self.registry.broadcast(&frame),
                None => Default::default(),
            };
            (revision, current, report)
        };
        self.stats.record_broadcast(report.delivered, report.evicted);
        self.stats.record_applied();

        let persisted = self.persist(revision, &current);

        debug!(
            revision,
            persisted,
            delivered = report.delivered,
            evicted = report.evicted,
            "applied update"
        );

        UpdateAck {
            revision,
            persisted,
            delivered: report.delivered,
        }
    }

    fn persist(&self, revision: u64, doc: &Document) -> bool {
        let mut newest = self.persist_lock.lock();
        if *newest >= revision {
            debug!(revision, newest = *newest, "skipping superseded save");
            return true;
        }
        *newest = revision;
        match self.store.save(doc) {
            Ok(()) => true,
            Err(e) => {
                self.stats.record_persist_failure();
                error!(revision, error = %e, "failed to persist state");
                false
            }
        }
    }

    /// Current document without side effects.
    pub fn snapshot(&self) -> Snapshot {
        self.state.get()
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// End every open subscription and refuse new ones. Returns how many
    /// were closed.
    pub fn close_all(&self) -> usize {
        let _seq = self.sequencer.lock();
        self.closed.store(true, Ordering::Release);
        let closed = self.registry.clear();
        info!(closed, "closed all subscriptions");
        closed
    }
}

fn encode(event: RelayEvent<'_>) -> Option<Frame> {
    match serde_json::to_string(&event) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            warn!(event = event.event_type(), error = %e, "failed to encode event");
            None
        }
    }
}
