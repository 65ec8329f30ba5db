pub mod error;
pub mod file;

pub use error::StoreError;
pub use file::JsonFileStore;

use boardsync_core::Document;

/// Durable home of the single persisted document.
///
/// `load` is fail-soft: anything that prevents reading a valid document
/// yields `None` so a missing or corrupt record never blocks startup.
/// `save` replaces the record in full.
pub trait DurableStore: Send + Sync {
    fn load(&self) -> Option<Document>;

    fn save(&self, doc: &Document) -> Result<(), StoreError>;
}
