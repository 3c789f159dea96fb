//! Shared data structures for pothole detection ingestion
//!
//! This module defines the core types flowing through the server:
//! - DetectionId: join key shared by every artifact of one detection
//! - GpsFix / InertialSample: records appended to the per-kind logs
//! - SeverityTier / SummaryRecord: consolidation output

mod detection;
mod sensor;
mod summary;

pub use detection::*;
pub use sensor::*;
pub use summary::*;
