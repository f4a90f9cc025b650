//! `swatch` — serves Swatch Internet Time over HTTP and `WebSocket`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use swatch_core::BeatClock;
use swatch_server::{ServerConfig, SwatchServer};
use swatch_settings::SwatchSettings;
use swatch_telemetry::TelemetryConfig;
use tracing::{error, info, warn};

/// Swatch Internet Time server.
#[derive(Parser, Debug)]
#[command(name = "swatch", about = "Serve Swatch Internet Time over HTTP and WebSocket")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.swatch/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Push session poll interval in milliseconds (overrides settings).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    push_interval_ms: Option<u64>,

    /// Log level: trace, debug, info, warn or error (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Resolve settings: defaults, settings file, `SWATCH_*` env, then flags.
    fn settings(&self) -> Result<SwatchSettings> {
        let mut settings = match &self.config {
            Some(path) => swatch_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => swatch_settings::load_settings().context("Failed to load settings")?,
        };
        self.apply(&mut settings);
        Ok(settings)
    }

    fn apply(&self, settings: &mut SwatchSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(interval) = self.push_interval_ms {
            settings.push.interval_ms = interval;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    let telemetry = TelemetryConfig::from_level_name(&settings.logging.level, settings.logging.json)
        .context("Invalid log level")?
        .with_module_level("tower_http", tracing::Level::DEBUG);
    swatch_telemetry::init_telemetry(&telemetry).context("Failed to initialize logging")?;

    let config = ServerConfig::from(&settings);
    let server = SwatchServer::new(config, Arc::new(BeatClock))
        .context("Invalid server configuration")?;
    let (addr, mut handle) = server.listen().await.context("Failed to start server")?;
    info!(%addr, "swatch server ready");

    tokio::select! {
        joined = &mut handle => {
            // The listener stopped on its own.
            let result = joined.context("Server task panicked")?;
            let _ = server.shutdown_gracefully().await;
            return result.context("Server stopped unexpectedly");
        }
        () = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    if !server.shutdown_gracefully().await {
        warn!("some push sessions did not close before the timeout");
    }
    match handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "server stopped with error"),
        Err(e) => error!(error = %e, "server task failed"),
    }
    info!("shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                let _ = sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
