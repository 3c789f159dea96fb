//! Artifact Storage
//!
//! Append-only log and single-blob persistence keyed by detection id. The
//! [`ArtifactStore`] trait abstracts the backend so ingestion and
//! consolidation never touch paths directly:
//! - `FileArtifactStore`: flat files under a data directory (production)
//! - `InMemoryStore`: process-local maps for tests and ephemeral runs
//!
//! Typed access goes through [`records::append_record`] and
//! [`records::read_all`], which tolerate corrupt lines.

pub mod counter;
mod file_store;
pub mod index;
pub mod lockfile;
mod memory;
pub mod records;

pub use counter::DetectionCounter;
pub use file_store::FileArtifactStore;
pub use index::{DetectionIndex, DetectionStatus};
pub use lockfile::ProcessLock;
pub use memory::InMemoryStore;
pub use records::{append_record, read_all, RecordStream};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::types::{DetectionId, SensorKind};

/// Identifies one persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactKey {
    /// GPS fixes uploaded under one detection id
    GpsLog(DetectionId),
    /// Every GPS fix ever received, regardless of detection id
    ConsolidatedGpsLog,
    /// Accelerometer or gyroscope samples for one detection
    InertialLog(SensorKind, DetectionId),
    /// Raw image bytes for one detection
    Image(DetectionId),
    /// Consolidated summary for one detection
    Summary(DetectionId),
    /// Append-only detection index journal
    DetectionIndex,
    /// Next-id counter (decimal text)
    Counter,
}

impl ArtifactKey {
    /// Detection id this artifact belongs to, if it is per-detection.
    pub fn detection_id(&self) -> Option<&DetectionId> {
        match self {
            Self::GpsLog(id)
            | Self::InertialLog(_, id)
            | Self::Image(id)
            | Self::Summary(id) => Some(id),
            Self::ConsolidatedGpsLog | Self::DetectionIndex | Self::Counter => None,
        }
    }
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("corrupt counter value: {0:?}")]
    CorruptCounter(String),
    #[error("storage lock poisoned")]
    Poisoned,
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Lazily produced lines of one log artifact.
pub type LineIter = Box<dyn Iterator<Item = Result<String, StorageError>> + Send>;

/// Pluggable artifact persistence.
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across request handlers, and must serialize writes per key so that each
/// appended line lands whole.
pub trait ArtifactStore: Send + Sync {
    /// Append one line (without trailing newline) to a log artifact,
    /// creating it on first write. Existing content is never truncated.
    fn append_line(&self, key: &ArtifactKey, line: &str) -> Result<(), StorageError>;

    /// Read a log artifact line by line. A missing artifact yields no lines.
    fn read_lines(&self, key: &ArtifactKey) -> Result<LineIter, StorageError>;

    /// Replace a single-blob artifact with `bytes`.
    fn write_blob(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), StorageError>;

    /// Read a single-blob artifact, `None` when absent.
    fn read_blob(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, StorageError>;

    /// Whether the artifact exists.
    fn exists(&self, key: &ArtifactKey) -> bool;

    /// Every detection id that owns at least one artifact. Full scan; used
    /// only to seed the detection index.
    fn scan_detection_ids(&self) -> Result<Vec<DetectionId>, StorageError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Per-key write serialization for backends without their own locking.
#[derive(Default)]
pub(crate) struct KeyLocks {
    locks: Mutex<HashMap<ArtifactKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    /// Run `f` while holding the lock for `key`.
    ///
    /// The entry for `key` is dropped again once no caller holds or waits
    /// on it, so the map only grows with concurrent writers.
    pub(crate) fn with<R>(
        &self,
        key: &ArtifactKey,
        f: impl FnOnce() -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let lock = {
            let mut map = self.locks.lock().map_err(|_| StorageError::Poisoned)?;
            Arc::clone(map.entry(key.clone()).or_default())
        };
        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(_) => Err(StorageError::Poisoned),
        };
        drop(lock);

        // Clones are only taken under the map lock, so a count of one here
        // means nobody else can reach this entry.
        let mut map = self.locks.lock().map_err(|_| StorageError::Poisoned)?;
        if map.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            map.remove(key);
        }
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_id_of_key() {
        let id = DetectionId::from_sequence(3);
        assert_eq!(
            ArtifactKey::InertialLog(SensorKind::Gyroscope, id.clone()).detection_id(),
            Some(&id)
        );
        assert_eq!(ArtifactKey::ConsolidatedGpsLog.detection_id(), None);
    }

    #[test]
    fn test_key_locks_run_closure() {
        let locks = KeyLocks::default();
        let out = locks.with(&ArtifactKey::Counter, || Ok(7)).unwrap();
        assert_eq!(out, 7);
        // Re-entering for a different key while the first is released works.
        let out = locks
            .with(&ArtifactKey::DetectionIndex, || Ok("ok"))
            .unwrap();
        assert_eq!(out, "ok");
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn test_key_locks_released_after_concurrent_use() {
        let locks = Arc::new(KeyLocks::default());
        let hits = Arc::new(Mutex::new(0u32));

        let handles: Vec<_> = (0..8u64)
            .map(|n| {
                let locks = Arc::clone(&locks);
                let hits = Arc::clone(&hits);
                std::thread::spawn(move || {
                    let key = ArtifactKey::Image(DetectionId::from_sequence(n % 2));
                    for _ in 0..50 {
                        locks
                            .with(&key, || {
                                *hits.lock().unwrap() += 1;
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*hits.lock().unwrap(), 400);
        assert_eq!(locks.len(), 0);
    }
}
