//! Consolidation engine
//!
//! Walks the detection index and writes one summary per detection that has
//! become complete. Summaries are immutable: a detection that already has a
//! summary is never recomputed, so re-running a pass over an unchanged store
//! leaves every summary byte-identical.

use serde::Serialize;
use std::sync::{Arc, Mutex, TryLockError};
use tracing::{debug, error, info, warn};

use super::{ClassifyError, CompletenessDetector, GpsScope, SeverityClassifier};
use crate::storage::{
    read_all, ArtifactKey, ArtifactStore, DetectionIndex, DetectionStatus, StorageError,
};
use crate::types::{DetectionId, GpsFix, InertialSample, SensorKind, SummaryRecord};

#[derive(Debug, thiserror::Error)]
pub enum ConsolidationError {
    #[error("consolidation pass already running")]
    AlreadyRunning,
}

/// Why a complete detection could not be summarized this pass.
#[derive(Debug, thiserror::Error)]
enum SummaryFailure {
    #[error("no readable GPS fix")]
    NoGpsFix,
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedDetection {
    pub detection_id: DetectionId,
    pub reason: String,
}

/// Outcome of one consolidation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationReport {
    /// Summaries written by this pass
    pub summarized: Vec<DetectionId>,
    /// Detections skipped because a summary already exists
    pub already_summarized: usize,
    /// Detections still missing artifacts
    pub pending: Vec<DetectionId>,
    /// Complete detections whose summary could not be built
    pub failed: Vec<FailedDetection>,
}

pub struct ConsolidationEngine {
    store: Arc<dyn ArtifactStore>,
    index: Arc<DetectionIndex>,
    detector: CompletenessDetector,
    classifier: SeverityClassifier,
    gps_scope: GpsScope,
    running: Mutex<()>,
}

impl ConsolidationEngine {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        index: Arc<DetectionIndex>,
        classifier: SeverityClassifier,
        gps_scope: GpsScope,
    ) -> Self {
        Self {
            detector: CompletenessDetector::new(Arc::clone(&store), gps_scope),
            store,
            index,
            classifier,
            gps_scope,
            running: Mutex::new(()),
        }
    }

    /// Run one pass over every known detection.
    ///
    /// Only one pass runs at a time; a concurrent call returns
    /// [`ConsolidationError::AlreadyRunning`] instead of waiting.
    pub fn consolidate(&self) -> Result<ConsolidationReport, ConsolidationError> {
        let _pass = match self.running.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(ConsolidationError::AlreadyRunning),
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("Consolidation lock poisoned by an earlier pass, recovering");
                poisoned.into_inner()
            }
        };

        let mut report = ConsolidationReport::default();

        for id in self.index.ids() {
            if self.already_summarized(&id) {
                report.already_summarized += 1;
                continue;
            }

            let missing = self.detector.missing(&id);
            if !missing.is_empty() {
                info!(detection_id = %id, missing = ?missing, "Skipping detection due to missing data");
                report.pending.push(id);
                continue;
            }

            match self.summarize(&id) {
                Ok(summary) => {
                    info!(
                        detection_id = %id,
                        severity = %summary.severity,
                        latitude = summary.latitude,
                        longitude = summary.longitude,
                        "Detection summarized"
                    );
                    if let Err(e) = self.index.mark_summarized(&id) {
                        // The summary file itself is authoritative; next pass re-marks it.
                        warn!(detection_id = %id, error = %e, "Failed to record summary in index");
                    }
                    report.summarized.push(id);
                }
                Err(e) => {
                    error!(detection_id = %id, error = %e, "Failed to summarize detection");
                    report.failed.push(FailedDetection {
                        detection_id: id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            summarized = report.summarized.len(),
            already_summarized = report.already_summarized,
            pending = report.pending.len(),
            failed = report.failed.len(),
            "Consolidation pass complete"
        );

        Ok(report)
    }

    /// Stored summary for one detection, if it exists and parses.
    pub fn summary(&self, id: &DetectionId) -> Option<SummaryRecord> {
        let bytes = match self.store.read_blob(&ArtifactKey::Summary(id.clone())) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(detection_id = %id, error = %e, "Failed to read summary");
                return None;
            }
        };
        serde_json::from_slice(&bytes)
            .inspect_err(|e| warn!(detection_id = %id, error = %e, "Corrupt summary file"))
            .ok()
    }

    /// Every readable summary, in detection order.
    pub fn summaries(&self) -> Vec<(DetectionId, SummaryRecord)> {
        self.index
            .ids()
            .into_iter()
            .filter(|id| self.index.status(id) == Some(DetectionStatus::Summarized))
            .filter_map(|id| self.summary(&id).map(|s| (id, s)))
            .collect()
    }

    /// A readable summary exists. An unreadable one is rebuilt as if absent.
    fn already_summarized(&self, id: &DetectionId) -> bool {
        if self.store.exists(&ArtifactKey::Summary(id.clone())) {
            if self.summary(id).is_none() {
                warn!(detection_id = %id, "Summary file unreadable, rebuilding");
                return false;
            }
            if self.index.status(id) != Some(DetectionStatus::Summarized) {
                if let Err(e) = self.index.mark_summarized(id) {
                    warn!(detection_id = %id, error = %e, "Failed to record summary in index");
                }
            }
            return true;
        }
        false
    }

    fn summarize(&self, id: &DetectionId) -> Result<SummaryRecord, SummaryFailure> {
        let store = self.store.as_ref();

        let fix = read_all::<GpsFix>(store, &self.gps_scope.log_key(id))?
            .next()
            .ok_or(SummaryFailure::NoGpsFix)?;
        let accelerometer = Self::samples(store, SensorKind::Accelerometer, id)?;
        let gyroscope = Self::samples(store, SensorKind::Gyroscope, id)?;

        let severity = self.classifier.classify(&accelerometer, &gyroscope)?;

        let summary = SummaryRecord {
            latitude: fix.latitude,
            longitude: fix.longitude,
            severity,
            image: id.image_filename(),
        };

        store.write_blob(&ArtifactKey::Summary(id.clone()), &render_summary(&summary)?)?;
        Ok(summary)
    }

    fn samples(
        store: &dyn ArtifactStore,
        sensor: SensorKind,
        id: &DetectionId,
    ) -> Result<Vec<InertialSample>, StorageError> {
        let mut stream = read_all::<InertialSample>(store, &ArtifactKey::InertialLog(sensor, id.clone()))?;
        let samples: Vec<InertialSample> = stream.by_ref().collect();
        if stream.skipped() > 0 {
            debug!(
                detection_id = %id,
                sensor = %sensor,
                skipped = stream.skipped(),
                "Corrupt samples ignored"
            );
        }
        Ok(samples)
    }
}

/// Summary file contents: JSON indented by four spaces.
fn render_summary(summary: &SummaryRecord) -> Result<Vec<u8>, StorageError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    summary
        .serialize(&mut serializer)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(out)
}
