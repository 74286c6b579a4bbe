//! geoalert CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration** — load the TOML config file, apply environment
//!    and command-line overrides, and validate the result.
//! 2. **Wire observability** — configure `tracing-subscriber` (JSON or pretty)
//!    and, when an endpoint is configured, an OpenTelemetry OTLP exporter.
//! 3. **Construct the pipeline** — build the geofence set, the event queue,
//!    the [`ingest::Ingestor`], the alert worker pool, and the webhook router.
//! 4. **Run until signalled** — serve webhooks until Ctrl-C or SIGTERM, then
//!    stop intake, stop the workers, and flush telemetry.

mod config;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ingest::{google_maps_link, EventQueue, Ingestor};
use listener::{build_router, serve, LogDispatcher, WorkerPool};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{AppConfig, ConfigSource};

/// Location-filtered webhook alerting.
#[derive(Parser, Debug)]
#[command(name = "geoalert")]
#[command(about = "Receives map webhooks, filters them by geofence, and dispatches alerts")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, short, env = "GEOALERT_CONFIG", default_value = "./geoalert.toml")]
    config: PathBuf,

    /// Listen address (overrides the config file)
    #[arg(long)]
    bind: Option<String>,

    /// Number of alert workers (overrides the config file)
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, source) = AppConfig::load(&args.config)
        .await
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.validate().context("invalid configuration")?;

    let telemetry = telemetry::init(config.log_format, config.otlp_endpoint.as_deref())?;
    match &source {
        ConfigSource::File(path) => info!(path = %path.display(), "configuration loaded"),
        ConfigSource::Defaults(path) => {
            warn!(path = %path.display(), "config file not found, using defaults");
        }
    }

    let geofences = Arc::new(config.geofence_set()?);
    if geofences.is_empty() {
        warn!("no geofences configured; every location is alertable");
    } else {
        info!(geofences = geofences.len(), "geofences loaded");
    }

    let queue = Arc::new(EventQueue::with_capacity(config.queue_bound()));
    let ingestor = Ingestor::new(geofences, Arc::clone(&queue), google_maps_link);

    let (stop, shutdown) = watch::channel(false);
    let workers = WorkerPool::spawn(
        config.worker_count()?,
        Arc::clone(&queue),
        Arc::new(LogDispatcher),
        shutdown,
    );

    let router = build_router(ingestor, config.max_body_bytes);
    let served = serve(config.bind_socket_addr()?, router, shutdown_signal()).await;

    info!(pending = queue.len(), "stopping alert workers");
    // Workers hold receivers, so send only fails once they are all gone.
    let _ = stop.send(true);
    workers.join().await;
    telemetry.shutdown();

    served.context("webhook listener failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
