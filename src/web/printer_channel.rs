//! Defines the communication channel messages between the web server and
//! the driver task, and the task loop itself.
//!
//! The task is the serialization boundary the wire protocol demands: it
//! owns the [`Driver`] outright and handles one request at a time, so two
//! HTTP calls can never interleave exchanges on the connection. Callers
//! queue behind the mpsc channel.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::driver::{Command, Driver, DriverError, Snapshot};

/// Represents a request sent from a web handler to the driver task.
#[derive(Debug)]
pub enum DriverRequest {
    /// Poll the printer for a fresh snapshot, falling back to the last
    /// known one when every query comes back empty.
    GetStatus {
        respond_to: oneshot::Sender<Result<Snapshot, DriverError>>,
    },
    /// Rebind the driver to another printer, then poll it.
    GetStatusFor {
        host: String,
        port: u16,
        respond_to: oneshot::Sender<Result<Snapshot, DriverError>>,
    },
    /// The raw temperature line exactly as the firmware reports it.
    GetRawTemps {
        respond_to: oneshot::Sender<Result<String, DriverError>>,
    },
    /// Stream a local G-code file to the printer's storage.
    Upload {
        path: PathBuf,
        respond_to: oneshot::Sender<Result<(), DriverError>>,
    },
    /// Select a stored file and start printing it.
    StartPrint {
        filename: String,
        respond_to: oneshot::Sender<Result<(), DriverError>>,
    },
    /// Pause the current print job.
    PauseJob {
        respond_to: oneshot::Sender<Result<(), DriverError>>,
    },
    /// Resume the paused print job.
    ResumeJob {
        respond_to: oneshot::Sender<Result<(), DriverError>>,
    },
    /// Abort the current print job.
    AbortJob {
        respond_to: oneshot::Sender<Result<(), DriverError>>,
    },
    /// Toggle between SD and USB storage.
    SwitchStorage {
        respond_to: oneshot::Sender<Result<(), DriverError>>,
    },
    /// Drop the current connection and dial the printer again.
    Reconnect {
        respond_to: oneshot::Sender<Result<(), DriverError>>,
    },
}

/// Run the driver-owning task until every request sender is dropped.
pub async fn run_driver(
    mut driver: Driver,
    pace: Option<Duration>,
    mut rx: mpsc::Receiver<DriverRequest>,
) {
    while let Some(request) = rx.recv().await {
        match request {
            DriverRequest::GetStatus { respond_to } => {
                let _ = respond_to.send(poll_with_fallback(&mut driver, pace).await);
            }
            DriverRequest::GetStatusFor { host, port, respond_to } => {
                let result = match driver.rebind(host, port).await {
                    Ok(()) => poll_with_fallback(&mut driver, pace).await,
                    Err(e) => Err(e),
                };
                let _ = respond_to.send(result);
            }
            DriverRequest::GetRawTemps { respond_to } => {
                let _ = respond_to.send(driver.send(&Command::TempQuery).await);
            }
            DriverRequest::Upload { path, respond_to } => {
                let _ = respond_to.send(driver.upload(&path).await);
            }
            DriverRequest::StartPrint { filename, respond_to } => {
                let _ = respond_to.send(driver.start_print(&filename).await);
            }
            DriverRequest::PauseJob { respond_to } => {
                let _ = respond_to.send(driver.pause().await);
            }
            DriverRequest::ResumeJob { respond_to } => {
                let _ = respond_to.send(driver.resume().await);
            }
            DriverRequest::AbortJob { respond_to } => {
                let _ = respond_to.send(driver.abort().await);
            }
            DriverRequest::SwitchStorage { respond_to } => {
                let _ = respond_to.send(driver.switch_storage().await);
            }
            DriverRequest::Reconnect { respond_to } => {
                let _ = respond_to.send(driver.connect().await);
            }
        }
    }
    tracing::info!("Driver task shutting down");
}

/// Poll, serving the retained snapshot when the fresh round is all misses.
async fn poll_with_fallback(
    driver: &mut Driver,
    pace: Option<Duration>,
) -> Result<Snapshot, DriverError> {
    let fresh = driver.poll(pace).await?;
    if fresh.is_empty() {
        if let Some(last) = driver.latest() {
            return Ok(last.clone());
        }
    }
    Ok(fresh)
}
