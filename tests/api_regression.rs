//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! the upload, log, id and consolidation endpoints using
//! `tower::ServiceExt::oneshot()`. No binary spawn, no network port.

use pothole_ingest::api::{create_app, ServerState};
use pothole_ingest::config::{defaults, ServerConfig};
use pothole_ingest::storage::InMemoryStore;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_state() -> ServerState {
    ServerState::build(Arc::new(InMemoryStore::new()), &ServerConfig::default()).unwrap()
}

fn app_for(state: &ServerState) -> Router {
    create_app(state.clone(), defaults::MAX_BODY_BYTES)
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn upload(detection_id: Option<&str>, content_type: &str, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header("Content-Type", content_type);
    if let Some(id) = detection_id {
        builder = builder.header("Detection-ID", id);
    }
    builder.body(body.into()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// POST without a Detection-ID header is rejected before anything else.
#[tokio::test]
async fn test_missing_detection_id_rejected() {
    let state = create_test_state();
    let (status, body) = send(
        app_for(&state),
        upload(None, "application/json", r#"{"latitude":1.0,"longitude":2.0}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"status": "error", "message": "Detection-ID header missing"}));
    assert!(state.index.is_empty());
}

#[tokio::test]
async fn test_unsupported_content_type_rejected() {
    let state = create_test_state();
    let (status, body) = send(
        app_for(&state),
        upload(Some("detection#1"), "text/plain", "hello"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unsupported content type");
}

#[tokio::test]
async fn test_gps_upload_acknowledged() {
    let state = create_test_state();
    let (status, body) = send(
        app_for(&state),
        upload(
            Some("detection#1"),
            "application/json; charset=utf-8",
            r#"{"latitude":40.7128,"longitude":-74.0060}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "success", "type": "gps"}));
    assert_eq!(state.index.len(), 1);
}

#[tokio::test]
async fn test_inertial_uploads_acknowledged_by_sensor() {
    let state = create_test_state();

    for sensor in ["accelerometer", "gyroscope"] {
        let payload = json!({"type": sensor, "x": 0.1, "y": 0.2, "z": 9.8}).to_string();
        let (status, body) = send(
            app_for(&state),
            upload(Some("detection#2"), "application/json", payload),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], sensor);
    }
}

#[tokio::test]
async fn test_invalid_sensor_type_rejected() {
    let state = create_test_state();
    let (status, body) = send(
        app_for(&state),
        upload(
            Some("detection#1"),
            "application/json",
            r#"{"type":"magnetometer","x":1,"y":2,"z":3}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid sensor data type");
    assert!(state.index.is_empty());
}

#[tokio::test]
async fn test_json_without_known_shape_rejected() {
    let state = create_test_state();
    let (status, body) = send(
        app_for(&state),
        upload(Some("detection#1"), "application/json", r#"{"speed":12}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid data format");
}

#[tokio::test]
async fn test_empty_json_rejected() {
    let state = create_test_state();
    let (status, body) = send(
        app_for(&state),
        upload(Some("detection#1"), "application/json", ""),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Empty JSON data received");
}

#[tokio::test]
async fn test_image_upload_returns_filename() {
    let state = create_test_state();
    let jpeg: Vec<u8> = vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];
    let (status, body) = send(
        app_for(&state),
        upload(Some("detection#3"), "image/jpeg", jpeg),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "success", "type": "image", "filename": "detection#3.jpg"})
    );
}

#[tokio::test]
async fn test_empty_image_rejected() {
    let state = create_test_state();
    let (status, body) = send(
        app_for(&state),
        upload(Some("detection#3"), "image/jpeg", Vec::<u8>::new()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Empty image data received");
}

#[tokio::test]
async fn test_path_traversal_detection_id_rejected() {
    let state = create_test_state();
    let (status, _) = send(
        app_for(&state),
        upload(Some("../escape"), "image/jpeg", vec![1u8, 2, 3]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(state.index.is_empty());
}

/// GET on any path aggregates every log across detections.
#[tokio::test]
async fn test_get_aggregates_logs() {
    let state = create_test_state();

    let uploads = [
        ("detection#1", r#"{"latitude":1.0,"longitude":2.0}"#),
        ("detection#1", r#"{"type":"accelerometer","x":1,"y":2,"z":3}"#),
        ("detection#2", r#"{"type":"accelerometer","x":4,"y":5,"z":6}"#),
        ("detection#2", r#"{"type":"gyroscope","x":0,"y":0,"z":1}"#),
    ];
    for (id, payload) in uploads {
        let (status, _) = send(app_for(&state), upload(Some(id), "application/json", payload)).await;
        assert_eq!(status, StatusCode::OK);
    }

    for uri in ["/", "/anything/else"] {
        let (status, body) = send(app_for(&state), get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["gps_log"].as_array().unwrap().len(), 1);
        assert_eq!(body["accelerometer_log"].as_array().unwrap().len(), 2);
        assert_eq!(body["gyroscope_log"].as_array().unwrap().len(), 1);
        assert_eq!(body["gps_log"][0]["latitude"], 1.0);
    }
}

#[tokio::test]
async fn test_get_on_empty_store() {
    let state = create_test_state();
    let (status, body) = send(app_for(&state), get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"gps_log": [], "accelerometer_log": [], "gyroscope_log": []})
    );
}

#[tokio::test]
async fn test_detection_ids_are_sequential() {
    let state = create_test_state();

    for expected in ["detection#1", "detection#2"] {
        let req = Request::builder()
            .method("POST")
            .uri("/detection-id")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app_for(&state), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "detection_id": expected}));
    }
}

/// A full upload round followed by POST /consolidate yields a summary.
#[tokio::test]
async fn test_consolidate_endpoint_summarizes_complete_detection() {
    let state = create_test_state();
    let id = "detection#1";

    let payloads = [
        r#"{"latitude":40.0,"longitude":-74.0}"#,
        r#"{"type":"accelerometer","x":1,"y":2,"z":30}"#,
        r#"{"type":"gyroscope","x":1,"y":1,"z":1}"#,
    ];
    for payload in payloads {
        send(app_for(&state), upload(Some(id), "application/json", payload)).await;
    }
    send(app_for(&state), upload(Some(id), "image/jpeg", vec![0xffu8, 0xd8])).await;
    // Second detection never gets an image
    send(
        app_for(&state),
        upload(Some("detection#2"), "application/json", payloads[0]),
    )
    .await;

    let req = Request::builder()
        .method("POST")
        .uri("/consolidate")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app_for(&state), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["summarized"], json!(["detection#1"]));
    assert_eq!(body["pending"], json!(["detection#2"]));

    let (status, body) = send(app_for(&state), get("/summaries")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{
            "detection_id": "detection#1",
            "latitude": 40.0,
            "longitude": -74.0,
            "severity": "Severe Pothole",
            "image": "detection#1.jpg"
        }])
    );

    let (_, health) = send(app_for(&state), get("/health")).await;
    assert_eq!(health["detections"], 2);
    assert_eq!(health["summarized"], 1);
}
