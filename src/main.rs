// src/main.rs - process wiring for the printer bridge
use std::sync::Arc;

use clap::Parser;
use tokio::sync::{RwLock, mpsc};

use ghost_host::config::{self, Config, ConfigError};
use ghost_host::driver::Driver;
use ghost_host::registry::Registry;
use ghost_host::web::api::{AppState, create_router};
use ghost_host::web::printer_channel::{DriverRequest, run_driver};

#[derive(Debug, Parser)]
#[command(name = "printer-host", about = "HTTP bridge for MKS Wi-Fi printers")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(default_value = "ghost.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Ghost printer bridge");

    let args = Args::parse();
    let config = match config::load_config(&args.config) {
        Ok(config) => config,
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("No config file at '{}', using defaults", args.config);
            Config::default()
        }
        Err(e) => return Err(Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    };

    tracing::info!(
        "Printer: {} ({}:{})",
        config.printer.name.as_deref().unwrap_or("unnamed"),
        config.printer.host,
        config.printer.port
    );

    let registry = Registry::load(&config.registry.path).await?;

    // One shared driver for the whole process. A printer that is offline at
    // startup is a warning, not a fatal error; the API answers 503 until a
    // POST /printer/connect succeeds.
    let mut driver =
        Driver::with_timeout(&config.printer.host, config.printer.port, config.read_timeout());
    if let Err(e) = driver.connect().await {
        tracing::warn!("Printer unreachable at startup: {}", e);
    }

    let (driver_tx, driver_rx) = mpsc::channel::<DriverRequest>(16);
    tokio::spawn(run_driver(driver, config.poll_pacing(), driver_rx));

    let state = AppState {
        driver_tx,
        registry: Arc::new(RwLock::new(registry)),
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("Web API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
