use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tollgate::admission::{AdmissionPipeline, AdmissionQueue, EvictionSweeper};
use tollgate::config::TollgateConfig;
use tollgate::http::{AppState, HttpServer};
use tollgate::ratelimit::ClientRegistry;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Multi-tenant admission control for HTTP endpoints.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!("Starting Tollgate Admission Control Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = TollgateConfig::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.server.http_addr = listen;
    }
    info!(
        http_addr = %config.server.http_addr,
        queue_capacity = config.admission.queue_capacity,
        "Configuration loaded"
    );
    if config.server.admin_token.is_none() {
        warn!("No admin token configured; any non-empty Authorization header is accepted");
    }

    // Initialize the registry and the admission queue
    let registry = Arc::new(ClientRegistry::with_refill_rate(config.admission.refill_rate));
    for spec in config.clients.iter().cloned() {
        registry.upsert(spec)?;
    }
    let queue = Arc::new(AdmissionQueue::new(config.admission.queue_capacity));
    let pipeline = AdmissionPipeline::new(queue.clone(), registry.clone());
    info!(clients = registry.len(), "Client registry initialized");

    let sweeper = EvictionSweeper::new(
        queue,
        config.admission.sweep_interval(),
        config.admission.staleness_window(),
    )?
    .spawn();

    let server = HttpServer::new(config.server.http_addr, AppState::new(pipeline, &config));

    // Run the server with graceful shutdown on Ctrl+C
    let served = server.serve_with_shutdown(shutdown_signal()).await;
    sweeper.shutdown().await;
    served?;

    info!("Tollgate Admission Control Service stopped");
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match cli.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
