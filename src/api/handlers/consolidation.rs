//! Consolidation and summary endpoints

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use super::ServerState;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::consolidation::ConsolidationError;
use crate::types::{DetectionId, SummaryRecord};

/// One summary with the detection it belongs to.
#[derive(Debug, Serialize)]
pub struct SummaryEntry {
    pub detection_id: DetectionId,
    #[serde(flatten)]
    pub summary: SummaryRecord,
}

/// POST /consolidate - Run a consolidation pass now
///
/// Returns the pass report, or 409 if a pass is already running.
pub async fn run_consolidation(State(state): State<ServerState>) -> Response {
    let engine = state.engine.clone();
    match tokio::task::spawn_blocking(move || engine.consolidate()).await {
        Ok(Ok(report)) => ApiResponse::success(report),
        Ok(Err(e @ ConsolidationError::AlreadyRunning)) => ApiErrorResponse::conflict(e.to_string()),
        Err(e) => {
            error!(error = %e, "Consolidation task panicked");
            ApiErrorResponse::internal("Server error")
        }
    }
}

/// GET /summaries - All summaries written so far
pub async fn get_summaries(State(state): State<ServerState>) -> Response {
    let entries: Vec<SummaryEntry> = state
        .engine
        .summaries()
        .into_iter()
        .map(|(detection_id, summary)| SummaryEntry {
            detection_id,
            summary,
        })
        .collect();
    Json(entries).into_response()
}
