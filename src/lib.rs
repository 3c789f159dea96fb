//! Pothole Ingest: road-hazard detection collection server
//!
//! Receives GPS fixes, inertial samples and camera images uploaded by
//! field devices under a shared detection id, and periodically joins them
//! into one severity-classified summary per detection.
//!
//! ## Architecture
//!
//! - **Ingest**: classifies each upload and appends it to the right log
//! - **Storage**: append-only logs and blobs behind the `ArtifactStore` trait
//! - **Consolidation**: completeness check, peak-based severity, summaries
//! - **API**: axum transport over the ingestion router and engine

pub mod api;
pub mod config;
pub mod consolidation;
pub mod ingest;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::ServerConfig;

// Re-export commonly used types
pub use types::{
    ArtifactKind, DetectionId, GpsFix, InertialSample, SensorKind, SeverityTier, SummaryRecord,
};

// Re-export pipeline components
pub use consolidation::{ConsolidationEngine, ConsolidationReport, GpsScope, SeverityClassifier};
pub use ingest::{IngestAck, IngestError, IngestRouter};

// Re-export storage
pub use storage::{ArtifactStore, FileArtifactStore, InMemoryStore, StorageError};
