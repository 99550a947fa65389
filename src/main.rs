//! minio-prometheus-sd -- Prometheus HTTP service discovery for MinIO.
//!
//! Configuration is resolved once at startup and then shared read-only.
//! SIGTERM/SIGINT stop accepting connections and let in-flight requests
//! finish before the process exits.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use minio_prometheus_sd::config::{Config, LoggingConfig, Overrides};
use minio_prometheus_sd::storage::backend::BucketLister;
use minio_prometheus_sd::storage::minio::MinioBucketLister;

/// Command-line arguments for the discovery service.
#[derive(Parser, Debug)]
#[command(
    name = "minio-prometheus-sd",
    version,
    about = "Prometheus HTTP service discovery for MinIO",
    after_help = "Every flag can also be set through the environment variable shown \
                  next to it; flags win over environment variables, which win over \
                  the YAML file.\n\n\
                  Examples:\n  \
                  minio-prometheus-sd --minio-endpoint=minio:9000 --minio-access-key=mykey\n  \
                  minio-prometheus-sd --listen-addr=:9090 --bucket-pattern='prod-*'"
)]
struct Cli {
    /// Path to an optional YAML configuration file.
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref(), cli.overrides)?;

    init_tracing(&config.logging);

    match &cli.config {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("No configuration file given, using defaults, environment and flags"),
    }
    config.log_summary();

    info!("Starting MinIO Prometheus Service Discovery service...");

    if config.observability.metrics {
        minio_prometheus_sd::metrics::init_metrics();
        minio_prometheus_sd::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    info!("Creating MinIO client for endpoint: {}", config.minio.endpoint);
    let lister: Arc<dyn BucketLister> = Arc::new(MinioBucketLister::new(&config.minio).await?);

    let bind_addr = config.listen_addr();

    let state = Arc::new(minio_prometheus_sd::AppState { config, lister });

    info!("Registering HTTP routes:");
    for (route, description) in minio_prometheus_sd::server::ROUTES {
        info!("  {} - {}", route, description);
    }
    let app = minio_prometheus_sd::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    info!("Service is ready to accept requests");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("MinIO Prometheus Service Discovery shut down");

    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
