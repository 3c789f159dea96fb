//! Consolidation pipeline
//!
//! Joins the independently uploaded artifacts of each detection into one
//! severity-classified summary:
//! - `CompletenessDetector`: are GPS, both inertial logs and the image present?
//! - `SeverityClassifier`: peak inertial reading -> severity tier
//! - `ConsolidationEngine`: one immutable summary per complete detection

mod completeness;
mod engine;
mod severity;

pub use completeness::CompletenessDetector;
pub use engine::{ConsolidationEngine, ConsolidationError, ConsolidationReport, FailedDetection};
pub use severity::{ClassifyError, SeverityClassifier};

use serde::{Deserialize, Serialize};

use crate::storage::ArtifactKey;
use crate::types::DetectionId;

/// Which GPS log a detection's fix is read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpsScope {
    /// Fixes uploaded under the detection's own id
    #[default]
    PerDetection,
    /// The consolidated log shared by every detection; any fix satisfies
    /// every detection and the first fix is used for all summaries
    Shared,
}

impl GpsScope {
    /// Log holding the GPS fixes for `id` under this scope.
    pub fn log_key(self, id: &DetectionId) -> ArtifactKey {
        match self {
            Self::PerDetection => ArtifactKey::GpsLog(id.clone()),
            Self::Shared => ArtifactKey::ConsolidatedGpsLog,
        }
    }
}
