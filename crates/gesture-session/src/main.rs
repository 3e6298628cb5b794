//! Gesture Session - Main Entry Point
//!
//! Usage: `gesture-session [config.toml]`. Every setting can also be given
//! as a `GESTURE__*` environment variable.

use std::path::PathBuf;

use gesture_session::{init_logging, init_metrics, run_session, SessionConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SessionConfig::load(config_path.as_deref())?;

    init_logging(config.level()?);

    info!("=== Gesture Session v{} ===", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Loaded configuration from {}", path.display());
    }
    if let Some(addr) = config.metrics_socket()? {
        init_metrics(addr)?;
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
    };

    let stats = run_session(&config, shutdown).await?;
    info!(
        "Session finished: {} frames read, {} source errors, {} events emitted",
        stats.frames_read, stats.source_errors, stats.events_emitted
    );

    Ok(())
}
