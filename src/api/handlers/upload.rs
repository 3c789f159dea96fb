//! Upload endpoint

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{info, warn};

use super::ServerState;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::api::DETECTION_ID_HEADER;
use crate::ingest::IngestError;
use crate::types::DetectionId;

/// Payload kind declared by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Image,
}

/// Classify the `Content-Type` header, ignoring parameters and case.
pub fn content_kind(headers: &HeaderMap) -> Option<ContentKind> {
    let raw = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = raw.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case("application/json") {
        Some(ContentKind::Json)
    } else if essence.eq_ignore_ascii_case("image/jpeg") {
        Some(ContentKind::Image)
    } else {
        None
    }
}

fn detection_id(headers: &HeaderMap) -> Result<DetectionId, IngestError> {
    let raw = headers
        .get(DETECTION_ID_HEADER)
        .ok_or(IngestError::MissingDetectionId)?;
    raw.to_str()
        .ok()
        .and_then(DetectionId::parse)
        .ok_or(IngestError::InvalidDetectionId)
}

/// POST (any path) - Store one GPS fix, inertial sample or image
///
/// Requires `Detection-ID`. `application/json` bodies are classified by
/// shape; `image/jpeg` bodies are stored verbatim as `<id>.jpg`.
pub async fn post_artifact(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let id = match detection_id(&headers) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Rejected upload");
            return e.into_response();
        }
    };

    let Some(kind) = content_kind(&headers) else {
        warn!(detection_id = %id, error = %IngestError::UnsupportedContentType, "Rejected upload");
        return IngestError::UnsupportedContentType.into_response();
    };

    // File appends and image writes stay off the async workers.
    let ingest = Arc::clone(&state.ingest);
    let task_id = id.clone();
    let result = tokio::task::spawn_blocking(move || match kind {
        ContentKind::Json => ingest.ingest_json(&task_id, &body),
        ContentKind::Image => ingest.ingest_image(&task_id, &body),
    })
    .await;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(detection_id = %id, error = %e, "Upload task panicked");
            return ApiErrorResponse::internal("Server error");
        }
    };

    match result {
        Ok(ack) => {
            info!(detection_id = %id, kind = %ack.kind, "Upload accepted");
            ApiResponse::success(ack)
        }
        Err(e) => {
            if e.is_client_error() {
                warn!(detection_id = %id, error = %e, "Rejected upload");
            } else {
                tracing::error!(detection_id = %id, error = %e, "Upload failed");
            }
            e.into_response()
        }
    }
}
