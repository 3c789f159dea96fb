//! Detection id counter
//!
//! Issues `detection#<n>` identifiers from a persisted decimal counter. The
//! increment is persisted before the in-memory value moves, so a failed
//! write never causes an id to be issued twice.

use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::{ArtifactKey, ArtifactStore, StorageError};
use crate::types::DetectionId;

pub struct DetectionCounter {
    store: Arc<dyn ArtifactStore>,
    last_issued: Mutex<u64>,
}

impl DetectionCounter {
    /// Load the counter, initialising it to zero on first run.
    pub fn open(store: Arc<dyn ArtifactStore>) -> Result<Self, StorageError> {
        let last_issued = match store.read_blob(&ArtifactKey::Counter)? {
            Some(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => {
                let recovered = Self::highest_stored_sequence(store.as_ref())?;
                store.write_blob(&ArtifactKey::Counter, recovered.to_string().as_bytes())?;
                warn!(recovered, "Detection counter was empty, rebuilt from stored detections");
                recovered
            }
            Some(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                text.trim()
                    .parse::<u64>()
                    .map_err(|_| StorageError::CorruptCounter(text.trim().to_string()))?
            }
            None => {
                store.write_blob(&ArtifactKey::Counter, b"0")?;
                info!("Detection counter initialised");
                0
            }
        };

        Ok(Self {
            store,
            last_issued: Mutex::new(last_issued),
        })
    }

    /// Highest counter-issued sequence that owns any artifact (0 if none).
    fn highest_stored_sequence(store: &dyn ArtifactStore) -> Result<u64, StorageError> {
        Ok(store
            .scan_detection_ids()?
            .iter()
            .filter_map(DetectionId::sequence)
            .max()
            .unwrap_or(0))
    }

    /// Issue the next detection id.
    pub fn next(&self) -> Result<DetectionId, StorageError> {
        let mut last = self.last_issued.lock().map_err(|_| StorageError::Poisoned)?;
        let n = *last + 1;
        self.store
            .write_blob(&ArtifactKey::Counter, n.to_string().as_bytes())?;
        *last = n;

        let id = DetectionId::from_sequence(n);
        debug!(detection_id = %id, "Issued detection id");
        Ok(id)
    }

    /// Sequence number of the most recently issued id (0 if none).
    pub fn last_issued(&self) -> u64 {
        self.last_issued.lock().map(|n| *n).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileArtifactStore, InMemoryStore};
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[test]
    fn test_first_run_initialises_to_zero() {
        let store: Arc<dyn ArtifactStore> = Arc::new(InMemoryStore::new());
        let counter = DetectionCounter::open(Arc::clone(&store)).unwrap();
        assert_eq!(counter.last_issued(), 0);
        assert_eq!(store.read_blob(&ArtifactKey::Counter).unwrap().unwrap(), b"0");
    }

    #[test]
    fn test_ids_increase_and_persist() {
        let temp_dir = tempdir().unwrap();
        let store: Arc<dyn ArtifactStore> =
            Arc::new(FileArtifactStore::open(temp_dir.path()).unwrap());

        {
            let counter = DetectionCounter::open(Arc::clone(&store)).unwrap();
            assert_eq!(counter.next().unwrap().as_str(), "detection#1");
            assert_eq!(counter.next().unwrap().as_str(), "detection#2");
        }

        // Reopen: never reuses an id
        let counter = DetectionCounter::open(store).unwrap();
        assert_eq!(counter.next().unwrap().as_str(), "detection#3");
        let on_disk =
            std::fs::read_to_string(temp_dir.path().join("Potholes/detection_counter.txt")).unwrap();
        assert_eq!(on_disk, "3");
    }

    #[test]
    fn test_empty_counter_rebuilt_from_store() {
        let temp_dir = tempdir().unwrap();
        let store: Arc<dyn ArtifactStore> =
            Arc::new(FileArtifactStore::open(temp_dir.path()).unwrap());
        store
            .write_blob(&ArtifactKey::Image(DetectionId::from_sequence(4)), b"\xff\xd8")
            .unwrap();
        store
            .append_line(&ArtifactKey::GpsLog(DetectionId::from_sequence(2)), "{}")
            .unwrap();
        std::fs::write(temp_dir.path().join("Potholes/detection_counter.txt"), "").unwrap();

        let counter = DetectionCounter::open(Arc::clone(&store)).unwrap();
        assert_eq!(counter.last_issued(), 4);
        assert_eq!(counter.next().unwrap().as_str(), "detection#5");
    }

    #[test]
    fn test_corrupt_counter_is_an_error() {
        let store: Arc<dyn ArtifactStore> = Arc::new(InMemoryStore::new());
        store.write_blob(&ArtifactKey::Counter, b"seven").unwrap();
        assert!(matches!(
            DetectionCounter::open(store),
            Err(StorageError::CorruptCounter(_))
        ));
    }

    #[test]
    fn test_concurrent_next_issues_unique_ids() {
        let store: Arc<dyn ArtifactStore> = Arc::new(InMemoryStore::new());
        let counter = Arc::new(DetectionCounter::open(store).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    (0..25).map(|_| counter.next().unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id issued");
            }
        }
        assert_eq!(seen.len(), 200);
        assert_eq!(counter.last_issued(), 200);
    }
}
