// src/registry.rs - persistent printer records (JSON file store)
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("printer {0} not found")]
    NotFound(u32),
}

/// One known printer: where to reach it and what to call it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterRecord {
    pub id: u32,
    pub name: String,
    pub address: String,
    pub port: u16,
}

/// Payload for creating a record. The port defaults to the module's
/// standard 8080 when omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPrinter {
    pub name: String,
    pub address: String,
    #[serde(default = "default_record_port")]
    pub port: u16,
}

fn default_record_port() -> u16 { 8080 }

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrinterPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub port: Option<u16>,
}

/// All printer records, held in memory and rewritten to disk on every
/// mutation. The file is replaced via a temp-file rename so a crash
/// mid-write never leaves a half-written registry behind.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    printers: Vec<PrinterRecord>,
}

impl Registry {
    /// Load the registry from `path`. A missing file is an empty registry.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let printers = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!("registry loaded: {} printer(s) from {}", printers.len(), path.display());
        Ok(Self { path, printers })
    }

    pub fn list(&self) -> &[PrinterRecord] {
        &self.printers
    }

    pub fn get(&self, id: u32) -> Option<&PrinterRecord> {
        self.printers.iter().find(|p| p.id == id)
    }

    pub async fn create(&mut self, new: NewPrinter) -> Result<PrinterRecord, RegistryError> {
        let id = self.printers.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let record = PrinterRecord {
            id,
            name: new.name,
            address: new.address,
            port: new.port,
        };
        self.printers.push(record.clone());
        self.save().await?;
        tracing::info!("registered printer {} ({}:{})", record.name, record.address, record.port);
        Ok(record)
    }

    pub async fn update(&mut self, id: u32, patch: PrinterPatch) -> Result<PrinterRecord, RegistryError> {
        let record = self
            .printers
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RegistryError::NotFound(id))?;
        if let Some(name) = patch.name {
            record.name = name;
        }
        if let Some(address) = patch.address {
            record.address = address;
        }
        if let Some(port) = patch.port {
            record.port = port;
        }
        let updated = record.clone();
        self.save().await?;
        Ok(updated)
    }

    pub async fn delete(&mut self, id: u32) -> Result<(), RegistryError> {
        let idx = self
            .printers
            .iter()
            .position(|p| p.id == id)
            .ok_or(RegistryError::NotFound(id))?;
        self.printers.remove(idx);
        self.save().await
    }

    async fn save(&self) -> Result<(), RegistryError> {
        let body = serde_json::to_vec_pretty(&self.printers)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
