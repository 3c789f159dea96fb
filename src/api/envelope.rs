//! Response envelope shared by every endpoint.
//!
//! Success: `{ "status": "success", ...body }`
//! Error:   `{ "status": "error", "message": "..." }`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::ingest::IngestError;

/// Successful response; the body's fields are flattened next to `status`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(body: T) -> Response {
        let body = Self {
            status: "success",
            body,
        };
        (StatusCode::OK, axum::Json(body)).into_response()
    }
}

/// Error response with a human-readable reason.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl ApiErrorResponse {
    fn build(status: StatusCode, msg: impl Into<String>) -> Response {
        let body = Self {
            status: "error",
            message: msg.into(),
        };
        (status, axum::Json(body)).into_response()
    }

    pub fn bad_request(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::BAD_REQUEST, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::CONFLICT, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            ApiErrorResponse::bad_request(self.to_string())
        } else {
            ApiErrorResponse::internal(self.to_string())
        }
    }
}
