//! Contains the data models for API requests and responses.

use serde::{Deserialize, Serialize};

/// JSON error body returned by failing handlers.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Request to print a file already stored on the printer.
#[derive(Debug, Deserialize)]
pub struct StartPrintRequest {
    pub filename: String,
}

/// Request to stream a local G-code file to the printer's storage.
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub path: String,
}
