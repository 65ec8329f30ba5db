use std::sync::Arc;

use boardsync_core::Document;
use parking_lot::RwLock;

/// A consistent view of the shared state.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// Bumped on every replace. `0` is whatever was loaded at startup.
    pub revision: u64,
    pub document: Option<Arc<Document>>,
}

/// In-memory holder of the current document. Last writer wins.
pub struct SharedState {
    inner: RwLock<Snapshot>,
}

impl SharedState {
    pub fn new(initial: Option<Document>) -> Self {
        Self {
            inner: RwLock::new(Snapshot {
                revision: 0,
                document: initial.map(Arc::new),
            }),
        }
    }

    pub fn get(&self) -> Snapshot {
        self.inner.read().clone()
    }

    /// Overwrite the current document. Returns the new revision and a
    /// handle to the stored document.
    pub fn replace(&self, doc: Document) -> (u64, Arc<Document>) {
        let doc = Arc::new(doc);
        let mut inner = self.inner.write();
        inner.revision += 1;
        inner.document = Some(Arc::clone(&doc));
        (inner.revision, doc)
    }
}
