//! Completeness detection

use std::sync::Arc;

use super::GpsScope;
use crate::storage::{read_all, ArtifactKey, ArtifactStore};
use crate::types::{ArtifactKind, DetectionId, GpsFix, SensorKind};

/// Decides whether every artifact a summary needs is present.
///
/// Read-only: evaluating a detection any number of times never changes the
/// store.
pub struct CompletenessDetector {
    store: Arc<dyn ArtifactStore>,
    gps_scope: GpsScope,
}

impl CompletenessDetector {
    pub fn new(store: Arc<dyn ArtifactStore>, gps_scope: GpsScope) -> Self {
        Self { store, gps_scope }
    }

    /// Artifacts still missing for `id`, in GPS/accelerometer/gyroscope/image order.
    pub fn missing(&self, id: &DetectionId) -> Vec<ArtifactKind> {
        let mut missing = Vec::new();

        if !self.has_gps_fix(id) {
            missing.push(ArtifactKind::Gps);
        }
        for sensor in SensorKind::ALL {
            if !self.store.exists(&ArtifactKey::InertialLog(sensor, id.clone())) {
                missing.push(sensor.into());
            }
        }
        if !self.store.exists(&ArtifactKey::Image(id.clone())) {
            missing.push(ArtifactKind::Image);
        }

        missing
    }

    pub fn is_complete(&self, id: &DetectionId) -> bool {
        self.missing(id).is_empty()
    }

    fn has_gps_fix(&self, id: &DetectionId) -> bool {
        read_all::<GpsFix>(self.store.as_ref(), &self.gps_scope.log_key(id))
            .map(|mut fixes| fixes.next().is_some())
            .unwrap_or(false)
    }
}
