//! Health and detection id endpoints

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use tracing::error;

use super::ServerState;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::types::DetectionId;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub detections: usize,
    pub summarized: usize,
    pub uptime_seconds: u64,
}

/// GET /health - Liveness plus store counters
pub async fn get_health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        backend: state.store.backend_name(),
        detections: state.index.len(),
        summarized: state.index.summarized_count(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize)]
pub struct IssuedId {
    pub detection_id: DetectionId,
}

/// POST /detection-id - Issue the next `detection#<n>` id
pub async fn issue_detection_id(State(state): State<ServerState>) -> Response {
    match state.counter.next() {
        Ok(detection_id) => ApiResponse::success(IssuedId { detection_id }),
        Err(e) => {
            error!(error = %e, "Failed to issue detection id");
            ApiErrorResponse::internal("Server error")
        }
    }
}
