//! ModelGuard CLI
//!
//! Drives the scoring and lineage engine against a JSON catalog file, or
//! against PostgreSQL when a database URL is configured.

mod commands;
mod config;
mod submission;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use modelguard_db::{
    create_pool, mask_password, ArtifactStore, InMemoryArtifactStore, InMemoryBlobStore, PgPool,
    PoolConfig, PostgresArtifactStore,
};
use modelguard_service::{ServiceRegistryBuilder, StaticPopularity};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use commands::Command;
use config::{CliConfig, DatabaseConfig};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "modelguard", author, version, about, long_about = None)]
struct Args {
    /// Configuration directory
    #[arg(short, long, env = "CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Environment (development, production, etc.)
    #[arg(short, long, env = "ENVIRONMENT")]
    environment: Option<String>,

    /// JSON catalog file
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Database URL; overrides the catalog file
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Where the artifact records live for this invocation
enum Backend {
    File {
        store: Arc<InMemoryArtifactStore>,
        path: PathBuf,
    },
    Postgres {
        store: Arc<PostgresArtifactStore>,
    },
}

impl Backend {
    fn store(&self) -> Arc<dyn ArtifactStore> {
        match self {
            Backend::File { store, .. } => store.clone(),
            Backend::Postgres { store } => store.clone(),
        }
    }

    /// Write the catalog file back; Postgres writes through
    async fn persist(&self) -> Result<()> {
        match self {
            Backend::File { store, path } => {
                commands::save_catalog(store, path).await?;
                info!(path = %path.display(), "Catalog saved");
                Ok(())
            }
            Backend::Postgres { .. } => Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config_dir = args.config_dir.clone().unwrap_or_else(config::get_config_dir);
    let environment = args.environment.clone().unwrap_or_else(config::get_environment);
    let mut config = CliConfig::load_or_default(&config_dir, &environment);

    if let Some(catalog) = args.catalog {
        config.storage.catalog_path = catalog;
    }
    if let Some(database_url) = args.database_url {
        config.database.url = Some(database_url);
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }

    telemetry::init_with_config(telemetry::TelemetryConfig::from(&config.logging));

    debug!(
        environment = %environment,
        config_dir = %config_dir.display(),
        "Configuration loaded"
    );

    let backend = open_backend(&config, &args.command).await?;
    let store = backend.store();

    let services = ServiceRegistryBuilder::new()
        .store(store.clone())
        .blobs(Arc::new(InMemoryBlobStore::new()))
        .popularity(Arc::new(StaticPopularity::new(
            config.popularity.names.iter().cloned(),
        )))
        .config(config.engine.clone())
        .build()
        .context("Invalid engine configuration")?;

    let output = commands::execute(&args.command, &services, store.as_ref()).await?;
    if args.command.is_mutating() {
        backend.persist().await?;
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn open_backend(config: &CliConfig, command: &Command) -> Result<Backend> {
    match &config.database.url {
        Some(url) => {
            info!("Database: {}", mask_password(url));
            let pool = setup_database(&config.database, url).await?;
            Ok(Backend::Postgres {
                store: Arc::new(PostgresArtifactStore::new(pool)),
            })
        }
        None => {
            let path = config.storage.catalog_path.clone();
            commands::ensure_catalog_present(&path, command)?;
            let store = commands::load_catalog(&path).await?;
            Ok(Backend::File {
                store: Arc::new(store),
                path,
            })
        }
    }
}

/// Setup database connection pool
async fn setup_database(database: &DatabaseConfig, url: &str) -> Result<PgPool> {
    let pool_config = PoolConfig::new(url)
        .max_connections(database.max_connections)
        .min_connections(database.min_connections)
        .connect_timeout(Duration::from_secs(database.connect_timeout_seconds))
        .run_migrations(database.run_migrations);

    create_pool(&pool_config)
        .await
        .context("Failed to create database connection pool")
}
