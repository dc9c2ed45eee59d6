//! # Catalog Worker
//!
//! Drains the catalog task queue. One binary serves both roles:
//!
//! - `indexer`: keeps the search index in step with the store
//! - `importer`: pulls episodes from external sources into the store
//! - `all`: both roles in one worker pool
//! - `provision`: creates the search indices and exits

use anyhow::Context;
use catalog_config::{Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use catalog_core::{
    import::{ImportProcessor, ImporterRegistry},
    indexing::{IndexProvisioner, SearchIndexer},
    search::{IndexNames, OpenSearchClient, SearchEngine},
    store::PostgresStore,
    tasks::{
        RedisBroker, RetryPolicy, TaskBroker, TaskDispatcher, TaskQueue, TaskRouter,
        WorkerRuntime, WorkerRuntimeConfig,
    },
};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "catalog-worker")]
#[command(about = "Background workers for catalog indexing and imports")]
struct Cli {
    /// Path to a TOML config file (defaults to catalog.toml or config/catalog.toml)
    #[arg(long, global = true, env = "CATALOG_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file loaded before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Process search index and delete tasks
    Indexer,
    /// Process content import tasks (requires DATABASE_URL)
    Importer,
    /// Process every task kind in one pool
    All,
    /// Create missing search indices and exit
    Provision,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Provision => provision(&config).await,
        Command::Indexer => run(&config, Roles::INDEXER).await,
        Command::Importer => run(&config, Roles::IMPORTER).await,
        Command::All => run(&config, Roles::ALL).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let ConfigLoad { config, warnings } = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config.clone(),
        env_file: cli.env_file.clone(),
    })
    .load()
    .context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Override via RUST_LOG.
                "info,catalog_core=info,catalog_worker=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    Ok(config)
}

#[derive(Debug, Clone, Copy)]
struct Roles {
    indexer: bool,
    importer: bool,
}

impl Roles {
    const INDEXER: Roles = Roles {
        indexer: true,
        importer: false,
    };
    const IMPORTER: Roles = Roles {
        indexer: false,
        importer: true,
    };
    const ALL: Roles = Roles {
        indexer: true,
        importer: true,
    };
}

fn search_engine(config: &Config) -> anyhow::Result<Arc<dyn SearchEngine>> {
    let client = OpenSearchClient::new(&config.search)
        .context("failed to configure search client")?;
    Ok(Arc::new(client))
}

async fn provision(config: &Config) -> anyhow::Result<()> {
    let names = IndexNames::new(config.search.index_prefix.clone());
    let created = IndexProvisioner::new(search_engine(config)?, names)
        .ensure_indices()
        .await
        .context("index provisioning failed")?;
    info!(created = ?created, "search indices ready");
    Ok(())
}

async fn run(config: &Config, roles: Roles) -> anyhow::Result<()> {
    let broker: Arc<dyn TaskBroker> = Arc::new(
        RedisBroker::new(&config.redis.url, config.redis.namespace.clone())
            .await
            .context("failed to connect to Redis")?
            .with_dead_letter_limit(config.queue.dead_letter_limit),
    );
    broker.ping().await.context("Redis ping failed")?;

    let mut router = TaskRouter::new();
    let mut provisioner = None;

    if roles.indexer {
        let engine = search_engine(config)?;
        let names = IndexNames::new(config.search.index_prefix.clone());
        let indexer = Arc::new(SearchIndexer::new(Arc::clone(&engine), names.clone()));
        router = router.merge(indexer.routes());
        provisioner = Some(Arc::new(IndexProvisioner::new(engine, names)));
    }

    if roles.importer {
        let store = PostgresStore::connect(&config.database)
            .await
            .context("failed to connect to PostgreSQL")?;
        store.migrate().await.context("database migration failed")?;
        let processor = Arc::new(ImportProcessor::new(
            ImporterRegistry::with_defaults(),
            Arc::new(store),
            TaskQueue::new(Arc::clone(&broker)),
        ));
        router = router.merge(processor.routes());
    }

    let policy = RetryPolicy::from_config(&config.queue);
    info!(
        queue.concurrency = config.queue.concurrency,
        queue.max_retry = policy.max_retry(),
        queue.backoff = ?config.queue.backoff,
        queue.retry_delay = ?config.queue.retry_delay,
        queue.lease_ttl = ?config.queue.lease_ttl,
        queue.dead_letter_limit = config.queue.dead_letter_limit,
        "queue configuration in effect"
    );

    let mut runtime = WorkerRuntime::new(
        WorkerRuntimeConfig::from(&config.queue),
        broker,
        TaskDispatcher::new(router, policy),
    );
    if let Some(provisioner) = provisioner {
        runtime = runtime.with_provisioner(provisioner);
    }

    runtime.start().await.context("worker startup failed")?;

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));
    shutdown.cancelled().await;

    runtime.shutdown().await.context("worker shutdown failed")?;
    Ok(())
}

/// Cancels `shutdown` on Ctrl-C or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C"),
        _ = terminate => info!("received SIGTERM"),
    }
    shutdown.cancel();
}
