// Integration tests for the web API (axum handlers via tower oneshot).

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use ghost_host::driver::Driver;
use ghost_host::registry::Registry;
use ghost_host::web::api::{AppState, create_router};
use ghost_host::web::printer_channel::run_driver;
use http_body_util::BodyExt; // for .collect().await
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{RwLock, mpsc};
use tower::util::ServiceExt; // for `oneshot`

/// App wired to an unconnected driver: every live-printer route must answer
/// 503 while the registry routes keep working.
async fn offline_app(dir: &tempfile::TempDir) -> Router {
    let registry = Registry::load(dir.path().join("printers.json")).await.unwrap();
    let driver = Driver::with_timeout("127.0.0.1", 1, Duration::from_millis(100));
    let (driver_tx, driver_rx) = mpsc::channel(8);
    tokio::spawn(run_driver(driver, None, driver_rx));
    create_router(AppState {
        driver_tx,
        registry: Arc::new(RwLock::new(registry)),
    })
}

/// Mock printer that answers every status round with the same fixture.
async fn online_app(dir: &tempfile::TempDir) -> Router {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let reply = match line.as_str() {
                "M991" => "ok\r\nT:205.3/210.0 B:60.1/60.0\r\n",
                "M27" => "ok\r\nM27 37\r\n",
                "M992" => "ok\r\nM992 00:28:43\r\n",
                "M997" => "ok\r\nM997 PRINTING\r\n",
                _ => "ok\r\n",
            };
            write_half.write_all(reply.as_bytes()).await.unwrap();
        }
    });

    let registry = Registry::load(dir.path().join("printers.json")).await.unwrap();
    let mut driver =
        Driver::with_timeout(addr.ip().to_string(), addr.port(), Duration::from_millis(300));
    driver.connect().await.unwrap();
    let (driver_tx, driver_rx) = mpsc::channel(8);
    tokio::spawn(run_driver(driver, None, driver_rx));
    create_router(AppState {
        driver_tx,
        registry: Arc::new(RwLock::new(registry)),
    })
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_printer_crud_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let app = offline_app(&dir).await;

    // Create
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/printers",
            json!({"name": "Ghost 6", "address": "192.168.4.1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["id"], 1);
    assert_eq!(created["port"], 8080);

    // List
    let response = app.clone().oneshot(get("/api/v1/printers")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    // Update
    let request = Request::builder()
        .method("PUT")
        .uri("/api/v1/printers/1")
        .header("content-type", "application/json")
        .body(Body::from(json!({"name": "Renamed"}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Renamed");

    // Delete, then the record is gone
    let request = Request::builder()
        .method("DELETE")
        .uri("/api/v1/printers/1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.clone().oneshot(get("/api/v1/printers/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_printer_record_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = offline_app(&dir).await;
    let response = app.clone().oneshot(get("/api/v1/printers/99")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.oneshot(get("/api/v1/printers/99/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_is_503_when_printer_offline() {
    let dir = tempfile::tempdir().unwrap();
    let app = offline_app(&dir).await;
    let response = app.oneshot(get("/printer/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_print_control_is_503_when_printer_offline() {
    let dir = tempfile::tempdir().unwrap();
    let app = offline_app(&dir).await;
    let response = app
        .clone()
        .oneshot(post_json("/printer/print", json!({"filename": "JOB~1.GCO"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let response = app
        .oneshot(Request::builder().method("POST").uri("/printer/pause").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_status_returns_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let app = online_app(&dir).await;
    let response = app.oneshot(get("/printer/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["temps"]["T"], 205.3);
    assert_eq!(snapshot["temps"]["Bset"], 60.0);
    assert_eq!(snapshot["progress"], 37);
    assert_eq!(snapshot["elapsed"], "00:28:43");
    assert_eq!(snapshot["state"], "PRINTING");
    assert!(snapshot["stamp"].is_string());
}

#[tokio::test]
async fn test_raw_temps_passthrough() {
    let dir = tempfile::tempdir().unwrap();
    let app = online_app(&dir).await;
    let response = app.oneshot(get("/printer/raw/temp")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"T:205.3/210.0 B:60.1/60.0");
}

#[tokio::test]
async fn test_dashboard_renders_html() {
    let dir = tempfile::tempdir().unwrap();
    let app = online_app(&dir).await;
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("PRINTING"));
    assert!(page.contains("37%"));
}
