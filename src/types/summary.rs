//! Consolidation output types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal pothole severity derived from peak inertial magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeverityTier {
    #[serde(rename = "Minor Pothole")]
    Minor,
    #[serde(rename = "Moderate Pothole")]
    Moderate,
    #[serde(rename = "Severe Pothole")]
    Severe,
}

impl SeverityTier {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Minor => "Minor Pothole",
            Self::Moderate => "Moderate Pothole",
            Self::Severe => "Severe Pothole",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable per-detection summary written once all artifacts are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub severity: SeverityTier,
    /// Image file name, e.g. `detection#1.jpg`
    pub image: String,
}
