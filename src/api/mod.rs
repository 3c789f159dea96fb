//! HTTP transport using Axum
//!
//! - `POST` (any path) with `Detection-ID`: sensor and image uploads
//! - `GET` (any path): every parsed log record, aggregated across detections
//! - `POST /detection-id`: issue a new detection id
//! - `POST /consolidate`, `GET /summaries`: consolidation on demand and results
//! - `GET /health`: liveness and store counters

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::ServerState;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request header carrying the detection id.
pub const DETECTION_ID_HEADER: &str = "detection-id";

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `POTHOLE_CORS_ORIGINS` to a comma-separated list of allowed origins,
/// e.g. for a map viewer served from another host.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(DETECTION_ID_HEADER)]);

    match std::env::var("POTHOLE_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the application router.
///
/// `max_body_bytes` replaces axum's 2 MiB default so camera images fit.
pub fn create_app(state: ServerState, max_body_bytes: usize) -> Router {
    routes::api_routes(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
