//! Defines the Axum API routes and handlers.
//!
//! Handlers never touch the driver directly; they post a [`DriverRequest`]
//! on the channel and wait for the oneshot answer. Connection-class
//! failures map to 503 so clients can tell "printer offline" apart from
//! device-side faults (500) and timeouts (504).

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::driver::{DriverError, Snapshot};
use crate::registry::{NewPrinter, PrinterPatch, PrinterRecord, Registry, RegistryError};
use crate::web::models::{ErrorResponse, StartPrintRequest, UploadRequest};
use crate::web::printer_channel::DriverRequest;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub driver_tx: mpsc::Sender<DriverRequest>,
    pub registry: Arc<RwLock<Registry>>,
}

/// Error type for all handlers: a status code plus a JSON `detail` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: "Printer not connected".to_string(),
        }
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, detail: detail.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

impl From<DriverError> for ApiError {
    fn from(err: DriverError) -> Self {
        let status = match err {
            DriverError::Connect(..) | DriverError::NotConnected | DriverError::Io(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            DriverError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            DriverError::NotFound(_) => StatusCode::NOT_FOUND,
            DriverError::Protocol(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, detail: err.to_string() }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = match err {
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, detail: err.to_string() }
    }
}

/// Creates the Axum router with all the API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/printer/status", get(printer_status))
        .route("/printer/raw/temp", get(raw_temps))
        .route("/printer/print", post(start_print))
        .route("/printer/pause", post(pause_job))
        .route("/printer/resume", post(resume_job))
        .route("/printer/abort", post(abort_job))
        .route("/printer/upload", post(upload))
        .route("/printer/storage/switch", post(switch_storage))
        .route("/printer/connect", post(reconnect))
        .route("/api/v1/printers", get(list_printers).post(create_printer))
        .route(
            "/api/v1/printers/{id}",
            get(get_printer).put(update_printer).delete(delete_printer),
        )
        .route("/api/v1/printers/{id}/status", get(printer_status_by_id))
        .with_state(state)
}

/// Post a request on the driver channel and wait for the answer.
async fn ask<T>(
    state: &AppState,
    build: impl FnOnce(oneshot::Sender<Result<T, DriverError>>) -> DriverRequest,
) -> Result<T, ApiError> {
    let (resp_tx, resp_rx) = oneshot::channel();
    state
        .driver_tx
        .send(build(resp_tx))
        .await
        .map_err(|_| ApiError::unavailable())?;
    let result = resp_rx.await.map_err(|_| ApiError::unavailable())?;
    result.map_err(ApiError::from)
}

// ---------------------------------------------------------------------
// Live printer endpoints
// ---------------------------------------------------------------------

/// Current printer snapshot in JSON.
async fn printer_status(State(state): State<AppState>) -> Result<Json<Snapshot>, ApiError> {
    let snapshot = ask(&state, |respond_to| DriverRequest::GetStatus { respond_to }).await?;
    Ok(Json(snapshot))
}

/// Current printer temperatures, raw as reported by the firmware.
async fn raw_temps(State(state): State<AppState>) -> Result<String, ApiError> {
    ask(&state, |respond_to| DriverRequest::GetRawTemps { respond_to }).await
}

/// Snapshot of a registered printer: rebinds the shared driver to the
/// record's address, then polls it.
async fn printer_status_by_id(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Snapshot>, ApiError> {
    let (host, port) = {
        let registry = state.registry.read().await;
        let record = registry.get(id).ok_or_else(|| ApiError::not_found("Printer not found"))?;
        (record.address.clone(), record.port)
    };
    let snapshot = ask(&state, |respond_to| DriverRequest::GetStatusFor { host, port, respond_to }).await?;
    Ok(Json(snapshot))
}

async fn start_print(
    State(state): State<AppState>,
    Json(payload): Json<StartPrintRequest>,
) -> Result<StatusCode, ApiError> {
    ask(&state, |respond_to| DriverRequest::StartPrint {
        filename: payload.filename,
        respond_to,
    })
    .await?;
    Ok(StatusCode::OK)
}

async fn pause_job(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    ask(&state, |respond_to| DriverRequest::PauseJob { respond_to }).await?;
    Ok(StatusCode::OK)
}

async fn resume_job(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    ask(&state, |respond_to| DriverRequest::ResumeJob { respond_to }).await?;
    Ok(StatusCode::OK)
}

async fn abort_job(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    ask(&state, |respond_to| DriverRequest::AbortJob { respond_to }).await?;
    Ok(StatusCode::OK)
}

async fn upload(
    State(state): State<AppState>,
    Json(payload): Json<UploadRequest>,
) -> Result<StatusCode, ApiError> {
    ask(&state, |respond_to| DriverRequest::Upload {
        path: PathBuf::from(payload.path),
        respond_to,
    })
    .await?;
    Ok(StatusCode::CREATED)
}

async fn switch_storage(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    ask(&state, |respond_to| DriverRequest::SwitchStorage { respond_to }).await?;
    Ok(StatusCode::OK)
}

async fn reconnect(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    ask(&state, |respond_to| DriverRequest::Reconnect { respond_to }).await?;
    Ok(StatusCode::OK)
}

// ---------------------------------------------------------------------
// Printer registry endpoints
// ---------------------------------------------------------------------

async fn list_printers(State(state): State<AppState>) -> Json<Vec<PrinterRecord>> {
    let registry = state.registry.read().await;
    Json(registry.list().to_vec())
}

async fn create_printer(
    State(state): State<AppState>,
    Json(payload): Json<NewPrinter>,
) -> Result<(StatusCode, Json<PrinterRecord>), ApiError> {
    let mut registry = state.registry.write().await;
    let record = registry.create(payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_printer(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<PrinterRecord>, ApiError> {
    let registry = state.registry.read().await;
    let record = registry.get(id).ok_or_else(|| ApiError::not_found("Printer not found"))?;
    Ok(Json(record.clone()))
}

async fn update_printer(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(payload): Json<PrinterPatch>,
) -> Result<Json<PrinterRecord>, ApiError> {
    let mut registry = state.registry.write().await;
    let record = registry.update(id, payload).await?;
    Ok(Json(record))
}

async fn delete_printer(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<StatusCode, ApiError> {
    let mut registry = state.registry.write().await;
    registry.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------
// HTML front-end
// ---------------------------------------------------------------------

/// Minimal status dashboard; reloads itself every few seconds.
async fn dashboard(State(state): State<AppState>) -> Html<String> {
    let snapshot = ask(&state, |respond_to| DriverRequest::GetStatus { respond_to })
        .await
        .ok();
    Html(render_dashboard(snapshot.as_ref()))
}

fn render_dashboard(snapshot: Option<&Snapshot>) -> String {
    let body = match snapshot {
        Some(snap) if !snap.is_empty() => {
            let temps = snap
                .temps
                .map(|t| {
                    format!(
                        "hotend {:.1}&deg;C / {:.1}&deg;C &mdash; bed {:.1}&deg;C / {:.1}&deg;C",
                        t.hotend, t.hotend_target, t.bed, t.bed_target
                    )
                })
                .unwrap_or_else(|| "&ndash;".to_string());
            format!(
                "<table>\
                 <tr><th>State</th><td>{}</td></tr>\
                 <tr><th>Temperatures</th><td>{}</td></tr>\
                 <tr><th>Progress</th><td>{}</td></tr>\
                 <tr><th>Elapsed</th><td>{}</td></tr>\
                 <tr><th>As of</th><td>{}</td></tr>\
                 </table>",
                snap.state.as_deref().unwrap_or("-"),
                temps,
                snap.progress.map(|p| format!("{p}%")).unwrap_or_else(|| "-".to_string()),
                snap.elapsed.as_deref().unwrap_or("-"),
                snap.stamp.as_deref().unwrap_or("-"),
            )
        }
        _ => "<p>Printer offline or not answering.</p>".to_string(),
    };
    format!(
        "<!DOCTYPE html><html><head><title>Printer</title>\
         <meta http-equiv=\"refresh\" content=\"5\"></head>\
         <body><h1>Printer status</h1>{body}</body></html>"
    )
}
