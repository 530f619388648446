//! Chain Indexer CLI
//!
//! Entry point for the indexer binary. Provides subcommands for:
//! - `run` - start the HTTP entry points, the per-blockchain job supervisor,
//!   and serve until a shutdown signal arrives
//! - `bootstrap <slug>` - run a single bootstrap to completion and exit
//! - `migrate` - apply pending database migrations and exit

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::signal::unix::SignalKind;
use tracing::{error, info};

use mw_chain_indexer::api::{self, AppState};
use mw_chain_indexer::config::{LoggingSettings, Settings};
use mw_chain_indexer::events::BroadcastPublisher;
use mw_chain_indexer::indexer::{bootstrap, Supervisor};
use mw_chain_indexer::metrics;
use mw_chain_indexer::node::ReqwestNodeClient;
use mw_chain_indexer::ports::{EventPublisher, NodeClient, Store};
use mw_chain_indexer::store::{BlockCache, PostgresStore};
use mw_chain_indexer::types::primitives::Height;

/// Chain-state ingestion engine for Mimblewimble-family blockchains.
#[derive(Parser, Debug)]
#[command(name = "mw-chain-indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Environment name (selects `config/<name>.toml` over `config/default.toml`).
    #[arg(short, long, env = "APP_ENVIRONMENT", default_value = "development")]
    environment: String,

    /// Load configuration from this exact file instead of the environment lookup.
    #[arg(long)]
    config: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server and job supervisor; runs until Ctrl+C/SIGTERM.
    Run,

    /// Backfill one blockchain's full history and exit.
    Bootstrap {
        /// Slug of the blockchain to bootstrap.
        slug: String,

        /// Lowest height to backfill. Defaults to 0.
        #[arg(long)]
        start_height: Option<u64>,

        /// Highest height to backfill. Defaults to the node's current tip.
        #[arg(long)]
        end_height: Option<u64>,
    },

    /// Apply pending database migrations and exit.
    Migrate,
}

fn init_tracing(settings: &LoggingSettings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_settings(cli: &Cli) -> eyre::Result<Settings> {
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load(&cli.environment)?,
    };
    if let Err(errors) = settings.validate() {
        for err in &errors {
            error!(error = %err, "invalid configuration");
        }
        eyre::bail!("configuration failed validation ({} error(s))", errors.len());
    }
    Ok(settings)
}

async fn connect_store(settings: &Settings) -> eyre::Result<PostgresStore> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(settings.database.connect_timeout())
        .idle_timeout(settings.database.idle_timeout())
        .connect(&settings.database.url)
        .await?;
    Ok(PostgresStore::new(pool))
}

/// Resolves once either `SIGINT` (Ctrl+C) or `SIGTERM` arrives.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}

async fn run(settings: Settings) -> eyre::Result<()> {
    metrics::install(&settings.metrics)?;

    let store: Arc<dyn Store> = Arc::new(connect_store(&settings).await?);
    let node_client: Arc<dyn NodeClient> = Arc::new(ReqwestNodeClient::new(
        settings.node.api_url.clone(),
        settings.node.api_username.clone(),
        settings.node.api_password.clone(),
    )?);
    let cache = Arc::new(BlockCache::new(settings.cache.window_size));
    let publisher: Arc<dyn EventPublisher> = Arc::new(BroadcastPublisher::new());
    let supervisor = Arc::new(Supervisor::new());

    let state = AppState {
        store,
        cache,
        node_client,
        node_slug: Arc::from(settings.node.api_url.as_str()),
        supervisor: supervisor.clone(),
        publisher,
        ingestion_settings: Arc::new(settings.ingestion.clone()),
    };

    let app = api::router(state, settings.api.request_timeout());
    let addr: SocketAddr = format!("{}:{}", settings.api.host, settings.api.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown_signal());
    if let Err(err) = server.await {
        error!(%err, "HTTP server exited with an error");
    }

    info!("shutting down, waiting for in-flight jobs to finish");
    supervisor.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

async fn run_single_bootstrap(settings: Settings, slug: String, start_height: Option<u64>, end_height: Option<u64>) -> eyre::Result<()> {
    let store = connect_store(&settings).await?;
    let node_client = ReqwestNodeClient::new(
        settings.node.api_url.clone(),
        settings.node.api_username.clone(),
        settings.node.api_password.clone(),
    )?;
    let cache = BlockCache::new(settings.cache.window_size);

    let blockchain = store
        .get_blockchain(&slug)
        .await?
        .ok_or_else(|| eyre::eyre!("no blockchain registered with slug {slug:?}"))?;

    let end_height = match end_height {
        Some(h) => Height::new(h),
        None => node_client.get_tip().await?.height,
    };
    let start_height = Height::new(start_height.unwrap_or(0));
    let cancel = tokio_util::sync::CancellationToken::new();

    let outcome = bootstrap::run_bootstrap(
        &store,
        &cache,
        &node_client,
        &settings.node.api_url,
        &blockchain,
        start_height,
        end_height,
        false,
        &settings.ingestion,
        &cancel,
    )
    .await?;

    info!(blocks_written = outcome.blocks_written, reached = %outcome.end_height, "bootstrap finished");
    Ok(())
}

async fn run_migrations(settings: Settings) -> eyre::Result<()> {
    let store = connect_store(&settings).await?;
    store.run_migrations().await?;
    info!("migrations applied");
    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_tracing(&settings.logging);

    info!(version = mw_chain_indexer::VERSION, environment = %cli.environment, "starting chain indexer");

    match cli.command {
        Commands::Run => run(settings).await,
        Commands::Bootstrap { slug, start_height, end_height } => {
            run_single_bootstrap(settings, slug, start_height, end_height).await
        }
        Commands::Migrate => run_migrations(settings).await,
    }
}
