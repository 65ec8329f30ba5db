use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use boardsync_core::Document;
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::DurableStore;

/// Stores the document as pretty-printed JSON in a single file.
///
/// Writes go to a temp file in the same directory which is then renamed over
/// the record, so readers only ever see a complete serialization.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at `<dir>/<file_name>`.
    pub fn in_dir(dir: &Path, file_name: &str) -> Self {
        Self::new(dir.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    fn read(&self) -> Result<Option<Document>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value: Value = serde_json::from_slice(&bytes)?;
        Ok(Document::from_value(value))
    }
}

impl DurableStore for JsonFileStore {
    fn load(&self) -> Option<Document> {
        match self.read() {
            Ok(Some(doc)) => {
                info!(path = %self.path.display(), "loaded persisted state");
                Some(doc)
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "no persisted state");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable persisted state");
                None
            }
        }
    }

    fn save(&self, doc: &Document) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(doc)?;

        let _guard = self.write_lock.lock();
        let dir = self.parent_dir();
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::from(e.error))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "persisted state");
        Ok(())
    }
}
