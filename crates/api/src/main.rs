//! Order lifecycle worker: hosts lifecycles and serves the HTTP API.

use std::path::PathBuf;

use api::config::{Config, LogFormat};
use clap::Parser;
use history::{HistoryStore, InMemoryHistoryStore, PostgresHistoryStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command-line arguments for the worker.
#[derive(Parser, Debug)]
#[command(name = "order-worker", author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "ORDER_WORKER_CONFIG", default_value = "./config/worker.yaml")]
    config: PathBuf,
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn run<S: HistoryStore + Clone + 'static>(
    store: S,
    config: Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = api::create_host(store, &config)?;

    let resumed = host.recover().await?;
    tracing::info!(resumed = resumed.len(), "resumed unfinished lifecycles");

    let app = api::create_app(host, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, task_queue = %config.task_queue, "starting order worker");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 1. Load configuration
    let config = Config::load(&args.config)?;

    // 2. Initialize tracing
    init_tracing(&config);
    tracing::info!(config = %args.config.display(), "configuration loaded");

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 4. Pick the history store and run
    match config.database_url.clone() {
        Some(database_url) => {
            let store = PostgresHistoryStore::connect(&database_url).await?;
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL history store");
            run(store, config, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, history is kept in memory only");
            run(InMemoryHistoryStore::new(), config, metrics_handle).await
        }
    }
}
