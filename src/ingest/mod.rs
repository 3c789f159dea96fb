//! Ingestion Router
//!
//! Classifies an uploaded payload and routes it to the artifact store:
//! - JSON with `latitude` + `longitude`: GPS fix, appended to the
//!   per-detection GPS log and to the consolidated GPS log
//! - JSON with `type` = `accelerometer` | `gyroscope`: inertial sample,
//!   appended to that sensor's per-detection log
//! - Raw image bytes: written verbatim as `<detection id>.jpg`
//!
//! Classification always completes before the first write, so a rejected
//! upload leaves no trace in the store.

mod error;

pub use error::IngestError;

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::storage::{append_record, ArtifactKey, ArtifactStore, DetectionIndex};
use crate::types::{ArtifactKind, DetectionId, GpsFix, InertialSample, SensorKind};

/// Acknowledgment returned for an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestAck {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Outcome of classifying a JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Gps(GpsFix),
    Inertial(SensorKind, InertialSample),
}

/// Decide what a decoded JSON payload is, without touching storage.
pub fn classify(payload: &Value) -> Result<Classified, IngestError> {
    let object = payload.as_object().ok_or(IngestError::InvalidDataFormat)?;

    if object.contains_key("latitude") && object.contains_key("longitude") {
        let fix = serde_json::from_value::<GpsFix>(payload.clone()).map_err(|e| {
            IngestError::InvalidRecord {
                kind: ArtifactKind::Gps,
                reason: e.to_string(),
            }
        })?;
        return Ok(Classified::Gps(fix));
    }

    if let Some(type_field) = object.get("type") {
        let kind = type_field
            .as_str()
            .and_then(SensorKind::from_type_field)
            .ok_or(IngestError::InvalidSensorType)?;
        let sample = serde_json::from_value::<InertialSample>(payload.clone()).map_err(|e| {
            IngestError::InvalidRecord {
                kind: kind.into(),
                reason: e.to_string(),
            }
        })?;
        return Ok(Classified::Inertial(kind, sample));
    }

    Err(IngestError::InvalidDataFormat)
}

/// Routes uploads into the artifact store and keeps the detection index current.
pub struct IngestRouter {
    store: Arc<dyn ArtifactStore>,
    index: Arc<DetectionIndex>,
}

impl IngestRouter {
    pub fn new(store: Arc<dyn ArtifactStore>, index: Arc<DetectionIndex>) -> Self {
        Self { store, index }
    }

    /// Ingest a structured (JSON) upload.
    ///
    /// The payload object is stored as received so device-side extras
    /// (timestamps, accuracy) are kept alongside the validated fields.
    pub fn ingest_json(&self, id: &DetectionId, body: &[u8]) -> Result<IngestAck, IngestError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(IngestError::EmptyJson);
        }

        let payload: Value =
            serde_json::from_slice(body).map_err(|e| IngestError::MalformedJson(e.to_string()))?;
        debug!(detection_id = %id, payload = %payload, "Received JSON upload");

        let classified = classify(&payload)?;
        self.register(id)?;

        let kind = match classified {
            Classified::Gps(fix) => {
                let store = self.store.as_ref();
                append_record(store, &ArtifactKey::GpsLog(id.clone()), &payload)?;
                append_record(store, &ArtifactKey::ConsolidatedGpsLog, &payload)?;
                info!(
                    detection_id = %id,
                    latitude = fix.latitude,
                    longitude = fix.longitude,
                    "GPS fix recorded"
                );
                ArtifactKind::Gps
            }
            Classified::Inertial(sensor, _) => {
                append_record(
                    self.store.as_ref(),
                    &ArtifactKey::InertialLog(sensor, id.clone()),
                    &payload,
                )?;
                debug!(detection_id = %id, sensor = %sensor, "Inertial sample recorded");
                sensor.into()
            }
        };

        Ok(IngestAck {
            kind,
            filename: None,
        })
    }

    /// Ingest raw image bytes for a detection.
    pub fn ingest_image(&self, id: &DetectionId, bytes: &[u8]) -> Result<IngestAck, IngestError> {
        if bytes.is_empty() {
            return Err(IngestError::EmptyImage);
        }

        self.register(id)?;
        self.store.write_blob(&ArtifactKey::Image(id.clone()), bytes)?;

        let filename = id.image_filename();
        info!(detection_id = %id, bytes = bytes.len(), filename = %filename, "Saved image");

        Ok(IngestAck {
            kind: ArtifactKind::Image,
            filename: Some(filename),
        })
    }

    fn register(&self, id: &DetectionId) -> Result<(), IngestError> {
        if self.index.register(id)? {
            info!(detection_id = %id, "New detection registered");
        }
        Ok(())
    }
}
