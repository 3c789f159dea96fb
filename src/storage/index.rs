//! Detection index
//!
//! Set of known detection ids with their consolidation status, maintained
//! incrementally by ingestion so consolidation never has to enumerate the
//! whole store. Persisted as an append-only journal; on load the journal is
//! replayed (last entry per id wins) and then seeded from a one-off store
//! scan so data written before the index existed is still picked up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::info;

use super::records::{append_record, read_all};
use super::{ArtifactKey, ArtifactStore, StorageError};
use crate::types::DetectionId;

/// Consolidation status of one detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    /// Known, no summary yet
    Pending,
    /// Summary written; never recomputed
    Summarized,
}

/// One journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    detection_id: DetectionId,
    status: DetectionStatus,
    recorded_at: DateTime<Utc>,
}

pub struct DetectionIndex {
    store: Arc<dyn ArtifactStore>,
    entries: RwLock<BTreeMap<DetectionId, DetectionStatus>>,
}

impl DetectionIndex {
    /// Replay the journal and seed it from the store contents.
    pub fn load(store: Arc<dyn ArtifactStore>) -> Result<Self, StorageError> {
        let mut entries = BTreeMap::new();
        let mut journal = read_all::<IndexEntry>(store.as_ref(), &ArtifactKey::DetectionIndex)?;
        for entry in journal.by_ref() {
            entries.insert(entry.detection_id, entry.status);
        }
        let replayed = entries.len();

        let index = Self {
            store,
            entries: RwLock::new(entries),
        };

        let mut seeded = 0usize;
        for id in index.store.scan_detection_ids()? {
            if index.register(&id)? {
                seeded += 1;
            }
            if index.store.exists(&ArtifactKey::Summary(id.clone()))
                && index.status(&id) != Some(DetectionStatus::Summarized)
            {
                index.mark_summarized(&id)?;
            }
        }

        info!(
            replayed,
            seeded,
            corrupt = journal.skipped(),
            backend = index.store.backend_name(),
            "Detection index loaded"
        );

        Ok(index)
    }

    /// Record a detection id. Returns `true` when it was not known before.
    pub fn register(&self, id: &DetectionId) -> Result<bool, StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        if entries.contains_key(id) {
            return Ok(false);
        }
        self.journal(id, DetectionStatus::Pending)?;
        entries.insert(id.clone(), DetectionStatus::Pending);
        Ok(true)
    }

    /// Mark a detection as summarized.
    pub fn mark_summarized(&self, id: &DetectionId) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        if entries.get(id) == Some(&DetectionStatus::Summarized) {
            return Ok(());
        }
        self.journal(id, DetectionStatus::Summarized)?;
        entries.insert(id.clone(), DetectionStatus::Summarized);
        Ok(())
    }

    pub fn status(&self, id: &DetectionId) -> Option<DetectionStatus> {
        self.entries.read().ok()?.get(id).copied()
    }

    /// All known ids in detection order.
    pub fn ids(&self) -> Vec<DetectionId> {
        self.entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Ids still waiting for a summary.
    pub fn pending(&self) -> Vec<DetectionId> {
        self.entries
            .read()
            .map(|e| {
                e.iter()
                    .filter(|(_, s)| **s == DetectionStatus::Pending)
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summarized_count(&self) -> usize {
        self.entries
            .read()
            .map(|e| {
                e.values()
                    .filter(|s| **s == DetectionStatus::Summarized)
                    .count()
            })
            .unwrap_or(0)
    }

    fn journal(&self, id: &DetectionId, status: DetectionStatus) -> Result<(), StorageError> {
        let entry = IndexEntry {
            detection_id: id.clone(),
            status,
            recorded_at: Utc::now(),
        };
        append_record(self.store.as_ref(), &ArtifactKey::DetectionIndex, &entry)
    }
}
