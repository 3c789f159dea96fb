//! API route definitions
//!
//! Uploads and log reads are path-agnostic: devices post to whatever path
//! they were configured with, so `/` and every unclaimed path dispatch the
//! same way. The service paths claim one method each; the other method on
//! those paths still reaches the upload or log handler.

use axum::{routing::{get, post}, Router};

use super::handlers::{self, ServerState};

pub fn api_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", get(handlers::get_logs).post(handlers::post_artifact))
        .route("/health", get(handlers::get_health).post(handlers::post_artifact))
        .route("/detection-id", post(handlers::issue_detection_id).get(handlers::get_logs))
        .route("/consolidate", post(handlers::run_consolidation).get(handlers::get_logs))
        .route("/summaries", get(handlers::get_summaries).post(handlers::post_artifact))
        .route("/*path", get(handlers::get_logs).post(handlers::post_artifact))
        .with_state(state)
}
