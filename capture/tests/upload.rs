//! Upload sink contract tests against a mock collector.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::net::SocketAddr;
use std::sync::Arc;
use timelapse_capture::sink::UploadSink;
use timelapse_common::frame::Frame;
use tokio::sync::Mutex;

fn test_frame() -> Frame {
    Frame::from_bgr(16, 16, vec![90u8; 16 * 16 * 3]).unwrap()
}

async fn spawn_collector(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn server_error_yields_false_not_error() {
    let app = Router::new().route(
        "/api/data",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let addr = spawn_collector(app).await;

    let sink = UploadSink::new(&addr.to_string(), None);
    let ok = sink.upload(&test_frame()).await.unwrap();
    assert!(!ok);
}

#[tokio::test]
async fn redirect_status_is_not_success() {
    // Only exactly 200 counts as delivered.
    let app = Router::new().route("/api/data", post(|| async { StatusCode::CREATED }));
    let addr = spawn_collector(app).await;

    let sink = UploadSink::new(&addr.to_string(), None);
    let ok = sink.upload(&test_frame()).await.unwrap();
    assert!(!ok);
}

#[tokio::test]
async fn payload_matches_collector_contract() {
    let captured: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route(
            "/api/data",
            post(
                |State(captured): State<Arc<Mutex<Option<serde_json::Value>>>>,
                 Json(body): Json<serde_json::Value>| async move {
                    *captured.lock().await = Some(body);
                    StatusCode::OK
                },
            ),
        )
        .with_state(Arc::clone(&captured));
    let addr = spawn_collector(app).await;

    let sink = UploadSink::new(&addr.to_string(), None);
    let ok = sink.upload(&test_frame()).await.unwrap();
    assert!(ok);

    let body = captured.lock().await.take().expect("collector saw no body");
    let image = body["image"].as_str().expect("image field");
    let jpeg = BASE64.decode(image).expect("image is valid base64");
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    let filename = body["filename"].as_str().expect("filename field");
    assert!(filename.ends_with(".jpg"));

    assert!(body["timestamp"].as_i64().expect("timestamp field") > 0);

    // No weather client configured, so the field is omitted entirely.
    assert!(body.get("weather").is_none());
}
