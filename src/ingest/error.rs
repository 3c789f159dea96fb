//! Ingestion error taxonomy

use crate::storage::StorageError;
use crate::types::ArtifactKind;

/// Why an upload was rejected.
///
/// Everything except [`IngestError::Storage`] is a client format error:
/// reported to the device and never retried.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Detection-ID header missing")]
    MissingDetectionId,
    #[error("Invalid Detection-ID header")]
    InvalidDetectionId,
    #[error("Unsupported content type")]
    UnsupportedContentType,
    #[error("Empty JSON data received")]
    EmptyJson,
    #[error("Empty image data received")]
    EmptyImage,
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),
    #[error("Invalid data format")]
    InvalidDataFormat,
    #[error("Invalid sensor data type")]
    InvalidSensorType,
    #[error("Invalid {kind} record: {reason}")]
    InvalidRecord { kind: ArtifactKind, reason: String },
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl IngestError {
    /// Whether the caller sent something unacceptable (as opposed to a
    /// server-side storage failure).
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}
