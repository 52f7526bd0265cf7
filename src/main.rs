use anyhow::Context;
use clap::Parser;
use collect_gateway::app::dispatch::{DispatchClient, RetryPolicy};
use collect_gateway::app::gateway::IngestionGateway;
use collect_gateway::app::ports::{MessageChannel, StatusStore};
use collect_gateway::app::status::StatusReader;
use collect_gateway::config::{BrokerBackend, BrokerConfig, Config, StoreBackend, StoreConfig};
use collect_gateway::infra::{InMemoryChannel, InMemoryStatusStore, KafkaChannel, SqliteStatusStore};
use collect_gateway::{logging, metrics, server};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "collect_gateway")]
#[command(about = "Accepts build requests over HTTP and queues them for the build worker")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (defaults to ./collect_gateway.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding config and environment
    #[arg(short, long)]
    port: Option<u16>,
}

async fn connect_channel(config: &BrokerConfig) -> anyhow::Result<Arc<dyn MessageChannel>> {
    match config.backend {
        BrokerBackend::Kafka => {
            let channel = KafkaChannel::connect(config).await?;
            Ok(Arc::new(channel))
        }
        BrokerBackend::Memory => {
            warn!("Using the in-memory broker; build requests will not leave this process");
            Ok(Arc::new(InMemoryChannel::new()))
        }
    }
}

async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn StatusStore>> {
    match config.backend {
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStatusStore::open(&config.sqlite_path)?)),
        StoreBackend::Memory => Ok(Arc::new(InMemoryStatusStore::new())),
        #[cfg(feature = "db")]
        StoreBackend::Libsql => {
            let url = config
                .libsql_url
                .clone()
                .context("LIBSQL_URL is required for the libsql store")?;
            let token = config.libsql_auth_token.clone().unwrap_or_default();
            let store = collect_gateway::infra::LibsqlStatusStore::connect(url, token).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "db"))]
        StoreBackend::Libsql => {
            anyhow::bail!("the libsql status store requires building with `--features db`")
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received, draining requests");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let _log_guard = logging::init_logging(&config.logging);
    metrics::init_metrics(config.metrics.enabled);
    info!("collect_gateway {} starting", env!("CARGO_PKG_VERSION"));

    // No working dispatch path means no traffic: a broker failure here ends the process.
    let channel = connect_channel(&config.broker)
        .await
        .context("Error while creating a Kafka producer")?;
    let store = open_store(&config.store)
        .await
        .context("Error while opening the build status store")?;

    let dispatch = DispatchClient::new(
        channel,
        config.broker.topic.clone(),
        RetryPolicy::from_config(&config.broker),
    );
    let gateway = IngestionGateway::new(dispatch.clone(), StatusReader::new(store));

    let served = server::start_server(
        gateway,
        config.server.port,
        &config.server.base_path,
        shutdown_signal(),
    )
    .await;

    dispatch.close().await;
    served
}
