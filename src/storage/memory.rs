//! In-memory artifact store for tests and ephemeral runs
//!
//! Thread-safe via `RwLock`. Not durable, data is lost on restart.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use super::{ArtifactKey, ArtifactStore, LineIter, StorageError};
use crate::types::DetectionId;

#[derive(Default)]
pub struct InMemoryStore {
    artifacts: RwLock<HashMap<ArtifactKey, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for InMemoryStore {
    fn append_line(&self, key: &ArtifactKey, line: &str) -> Result<(), StorageError> {
        let mut store = self.artifacts.write().map_err(|_| StorageError::Poisoned)?;
        let buf = store.entry(key.clone()).or_default();
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        Ok(())
    }

    fn read_lines(&self, key: &ArtifactKey) -> Result<LineIter, StorageError> {
        let store = self.artifacts.read().map_err(|_| StorageError::Poisoned)?;
        let lines: Vec<Result<String, StorageError>> = store
            .get(key)
            .map(|buf| {
                buf.split(|b| *b == b'\n')
                    .map(|l| Ok(String::from_utf8_lossy(l).into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Box::new(lines.into_iter()))
    }

    fn write_blob(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), StorageError> {
        let mut store = self.artifacts.write().map_err(|_| StorageError::Poisoned)?;
        store.insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn read_blob(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, StorageError> {
        let store = self.artifacts.read().map_err(|_| StorageError::Poisoned)?;
        Ok(store.get(key).cloned())
    }

    fn exists(&self, key: &ArtifactKey) -> bool {
        self.artifacts
            .read()
            .map(|m| m.contains_key(key))
            .unwrap_or(false)
    }

    fn scan_detection_ids(&self) -> Result<Vec<DetectionId>, StorageError> {
        let store = self.artifacts.read().map_err(|_| StorageError::Poisoned)?;
        let ids: BTreeSet<DetectionId> = store
            .keys()
            .filter_map(ArtifactKey::detection_id)
            .cloned()
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
