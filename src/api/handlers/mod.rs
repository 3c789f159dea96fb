//! API route handlers
//!
//! - Uploads: detection-id header + content-type dispatch into the ingestion router
//! - Log aggregation across every known detection
//! - Consolidation on demand, summary listing, id issuance, health

mod consolidation;
mod logs;
mod status;
mod upload;

pub use consolidation::*;
pub use logs::*;
pub use status::*;
pub use upload::*;

use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::consolidation::ConsolidationEngine;
use crate::ingest::IngestRouter;
use crate::storage::{ArtifactStore, DetectionCounter, DetectionIndex, StorageError};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ServerState {
    /// Artifact store every component reads and writes through
    pub store: Arc<dyn ArtifactStore>,
    /// Known detections and their consolidation status
    pub index: Arc<DetectionIndex>,
    pub ingest: Arc<IngestRouter>,
    pub engine: Arc<ConsolidationEngine>,
    pub counter: Arc<DetectionCounter>,
    pub started_at: Instant,
}

impl ServerState {
    /// Wire up index, counter, router and engine over `store`.
    pub fn build(store: Arc<dyn ArtifactStore>, config: &ServerConfig) -> Result<Self, StorageError> {
        let index = Arc::new(DetectionIndex::load(Arc::clone(&store))?);
        let counter = Arc::new(DetectionCounter::open(Arc::clone(&store))?);
        let ingest = Arc::new(IngestRouter::new(Arc::clone(&store), Arc::clone(&index)));
        let engine = Arc::new(ConsolidationEngine::new(
            Arc::clone(&store),
            Arc::clone(&index),
            config.classification.classifier(),
            config.consolidation.gps_scope,
        ));

        Ok(Self {
            store,
            index,
            ingest,
            engine,
            counter,
            started_at: Instant::now(),
        })
    }
}
