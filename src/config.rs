// src/config.rs - Single configuration file
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration struct for the printer link, web server and registry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub printer: PrinterConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            printer: PrinterConfig::default(),
            server: ServerConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

/// Connection settings for the printer the service is bound to at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrinterConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_poll_pacing_ms")]
    pub poll_pacing_ms: u64,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            name: None,
            host: default_host(),
            port: default_port(),
            read_timeout_ms: default_read_timeout_ms(),
            poll_pacing_ms: default_poll_pacing_ms(),
        }
    }
}

/// Web server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

/// Printer registry storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { path: default_registry_path() }
    }
}

impl Config {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.printer.read_timeout_ms)
    }

    /// Pacing delay applied after each poll round; zero disables it.
    pub fn poll_pacing(&self) -> Option<Duration> {
        match self.printer.poll_pacing_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

// Default value functions
fn default_host() -> String { "192.168.4.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_read_timeout_ms() -> u64 { 5000 }
fn default_poll_pacing_ms() -> u64 { 500 }
fn default_bind() -> String { "0.0.0.0:3000".to_string() }
fn default_registry_path() -> String { "printers.json".to_string() }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}
