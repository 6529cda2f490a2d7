//! # Sensor Gateway
//!
//! Relays telemetry and camera frames from a remote sensor unit.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse command line, load configuration
//!    - Set up logging (stderr, optionally a daily log file)
//!    - Open frame storage
//!
//! 2. **Background tasks**
//!    - Ingestion loop: link → parser → telemetry store
//!    - Camera poller (optional): capture URL → frame cache
//!    - Uploader (optional): store snapshots → remote gateway
//!
//! 3. **Graceful Shutdown**
//!    - Ctrl+C triggers the shutdown signal
//!    - Every task is joined before exit
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- --config config/gateway.toml
//! cargo run --release -- --substitute --upload-url http://server:8000/update_sensor
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use sensor_gateway::camera::CameraPoller;
use sensor_gateway::config::{Config, LoggingConfig};
use sensor_gateway::frames::FrameCache;
use sensor_gateway::gateway::Gateway;
use sensor_gateway::ingest::{IngestSettings, IngestionLoop};
use sensor_gateway::link::opener_from_config;
use sensor_gateway::shutdown::Shutdown;
use sensor_gateway::telemetry::TelemetryStore;
use sensor_gateway::uploader::Uploader;

/// Default configuration path; a missing file here means "use defaults"
const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";

#[derive(Debug, Parser)]
#[command(name = "sensor-gateway", version, about = "Relay sensor telemetry and camera frames")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run on substitute data without opening the hardware link
    #[arg(long)]
    substitute: bool,

    /// Push snapshots to this remote update endpoint
    #[arg(long)]
    upload_url: Option<String>,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = if args.config == Path::new(DEFAULT_CONFIG_PATH) && !args.config.exists() {
        Config::default()
    } else {
        Config::load(&args.config)
            .with_context(|| format!("loading configuration from {}", args.config.display()))?
    };

    if args.substitute {
        config.substitute.force = true;
    }
    if let Some(url) = &args.upload_url {
        config.uploader.enabled = true;
        config.uploader.url = url.clone();
    }
    config.validate().context("validating configuration")?;
    Ok(config)
}

/// Install the tracing subscriber
///
/// The returned guard flushes the file writer and must live until exit.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sensor_gateway={}", config.level)));

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sensor-gateway.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let _log_guard = init_logging(&config.logging);

    info!("Sensor Gateway v{} starting...", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(TelemetryStore::new());
    let frames = Arc::new(
        FrameCache::open(&config.frames.dir, config.frames.extension.clone())
            .await
            .with_context(|| format!("opening frame storage at {}", config.frames.dir))?,
    );

    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    let ingest = IngestionLoop::new(
        opener_from_config(&config.link),
        Arc::clone(&store),
        IngestSettings::from_config(&config),
    );
    let gateway = Gateway::new(Arc::clone(&store), Arc::clone(&frames), ingest.link_state());
    let counters = ingest.counters();
    tasks.push(tokio::spawn(ingest.run(shutdown.signal())));

    if config.camera.enabled {
        let poller = CameraPoller::from_config(&config.camera, Arc::clone(&frames));
        tasks.push(tokio::spawn(poller.run(shutdown.signal())));
    }

    if config.uploader.enabled {
        info!("Relaying snapshots to {}", config.uploader.url);
        let uploader = Uploader::from_config(&config.uploader, Arc::clone(&store));
        tasks.push(tokio::spawn(uploader.run(shutdown.signal())));
    }

    info!("Press Ctrl+C to exit");

    let mut status_interval = tokio::time::interval(Duration::from_secs(config.status.log_interval_s));
    // First tick fires immediately; nothing to report yet
    status_interval.tick().await;

    loop {
        tokio::select! {
            _ = status_interval.tick() => {
                let snapshot = gateway.snapshot();
                let values = snapshot.values();
                let stats = counters.snapshot();
                let last_update = snapshot
                    .last_updated()
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                info!(
                    "Status: link={} temperature={:?} humidity={:?} tilt={:?} last_update={} lines={} applied={} read_errors={}",
                    gateway.link_state(),
                    values.temperature,
                    values.humidity,
                    values.tilt,
                    last_update,
                    stats.lines,
                    stats.applied,
                    stats.read_errors,
                );
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    shutdown.trigger();
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }

    info!("Sensor Gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path_loads() {
        // Either the shipped sample or built-in defaults
        let args = Args::parse_from(["sensor-gateway"]);
        let config = load_config(&args).unwrap();
        assert!(!config.substitute.force);
        assert!(!config.uploader.enabled);
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[substitute]\nforce = false\n").unwrap();

        let args = Args::parse_from([
            "sensor-gateway",
            "--config",
            path.to_str().unwrap(),
            "--substitute",
            "--upload-url",
            "http://server:8000/update_sensor",
        ]);
        let config = load_config(&args).unwrap();

        assert!(config.substitute.force);
        assert!(config.uploader.enabled);
        assert_eq!(config.uploader.url, "http://server:8000/update_sensor");
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let args = Args::parse_from(["sensor-gateway", "--config", "/nonexistent/gateway.toml"]);
        assert!(load_config(&args).is_err());
    }
}
