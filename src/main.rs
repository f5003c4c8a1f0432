//! Appraise maintenance binary.
//!
//! Operator entry point for the background side of the engine: schema
//! migration, the maintenance daemon, one-shot sweeps, and manual sync
//! runs. Request-path operations (sessions, results, invitations) are
//! consumed as a library by the surrounding platform.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use appraise::adapters::erp::HttpConnectorFactory;
use appraise::adapters::sqlite::{
    all_embedded_migrations, create_pool, Migrator, PoolConfig, SqliteErpRepository,
    SqliteInvitationRepository, SqliteResultRepository, SqliteSessionRepository,
};
use appraise::adapters::{FileArchiveStore, StaticCatalog};
use appraise::domain::models::{InvitePolicy, SyncType};
use appraise::infrastructure::{config::ConfigLoader, logging};
use appraise::services::{
    Archiver, ErpSyncEngine, InvitationService, MaintenanceDaemon, MaintenanceEvent,
    SessionService,
};

#[derive(Parser)]
#[command(name = "appraise", version, about = "Assessment result & roster engine maintenance")]
struct Cli {
    /// Path to a config file (defaults to .appraise/config.yaml + env)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Path to the static test catalog
    #[arg(long, global = true, default_value = ".appraise/catalog.yaml")]
    catalog: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Run the maintenance daemon (expiry sweeps + archive drain)
    Maintain,
    /// Run a single maintenance cycle and exit
    Cycle,
    /// Run a roster sync for one ERP config
    Sync {
        /// ERP config id
        #[arg(long)]
        config_id: Uuid,
        /// Partial pull: skip deactivation of absent employees
        #[arg(long)]
        incremental: bool,
    },
    /// Cancel the running sync for one ERP config
    CancelSync {
        /// ERP config id
        #[arg(long)]
        config_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let _logger = logging::init(&config.logging).context("Failed to initialize logging")?;

    let pool_config = PoolConfig {
        max_connections: config.database.max_connections,
        ..PoolConfig::default()
    };
    let pool = create_pool(&format!("sqlite:{}", config.database.path), Some(pool_config))
        .await
        .context("Failed to open database")?;

    let migrator = Migrator::new(pool.clone());

    if let Commands::Migrate = cli.command {
        let applied = migrator.run_embedded_migrations(all_embedded_migrations()).await?;
        println!("Applied {applied} migration(s)");
        return Ok(());
    }

    migrator.run_embedded_migrations(all_embedded_migrations()).await?;

    let catalog = Arc::new(load_catalog(&cli.catalog)?);
    let sessions_repo = Arc::new(SqliteSessionRepository::new(pool.clone()));
    let results_repo = Arc::new(SqliteResultRepository::new(pool.clone()));
    let erp_repo = Arc::new(SqliteErpRepository::new(pool.clone()));
    let invitations_repo = Arc::new(SqliteInvitationRepository::new(pool.clone()));
    let archive_store = Arc::new(FileArchiveStore::new(config.archive.root.clone()));

    let session_service = Arc::new(SessionService::new(
        sessions_repo,
        results_repo.clone(),
        catalog.clone(),
        Duration::minutes(i64::from(config.session.ttl_minutes)),
    ));
    let archiver = Arc::new(Archiver::new(
        results_repo.clone(),
        results_repo,
        archive_store,
        catalog.clone(),
        catalog,
        config.archive.clone(),
    ));
    let invitation_service = Arc::new(InvitationService::new(
        invitations_repo,
        erp_repo.clone(),
        erp_repo.clone(),
        InvitePolicy::from(&config.invitations),
        Duration::days(i64::from(config.invitations.validity_days)),
    ));
    let sync_engine = ErpSyncEngine::new(
        erp_repo.clone(),
        erp_repo.clone(),
        erp_repo,
        Arc::new(HttpConnectorFactory::new(std::time::Duration::from_secs(
            u64::from(config.sync.request_timeout_seconds),
        ))),
        config.sync.clone(),
    );

    match cli.command {
        Commands::Migrate => unreachable!("handled above"),
        Commands::Maintain => {
            let daemon = MaintenanceDaemon::new(
                session_service,
                archiver,
                invitation_service,
                config.maintenance.clone(),
            );
            let mut events = daemon.run().await;
            while let Some(event) = events.recv().await {
                if let MaintenanceEvent::Stopped { reason } = event {
                    println!("Maintenance daemon stopped: {reason:?}");
                    break;
                }
            }
        }
        Commands::Cycle => {
            let daemon = MaintenanceDaemon::new(
                session_service,
                archiver,
                invitation_service,
                config.maintenance.clone(),
            );
            let report = daemon.run_cycle().await?;
            println!(
                "Cycle done: {} sessions expired, {} results archived, {} invitations expired",
                report.expired_sessions, report.archive.archived, report.expired_invitations
            );
        }
        Commands::Sync {
            config_id,
            incremental,
        } => {
            let sync_type = if incremental {
                SyncType::Incremental
            } else {
                SyncType::Full
            };
            let log = sync_engine.run_sync(config_id, sync_type).await?;
            println!(
                "Sync {}: created {}, updated {}, deactivated {}, errors {}",
                log.status.as_str(),
                log.created_count,
                log.updated_count,
                log.deactivated_count,
                log.error_count
            );
        }
        Commands::CancelSync { config_id } => {
            let log = sync_engine.cancel_sync(config_id).await?;
            println!("Cancelled sync {}", log.id);
        }
    }

    Ok(())
}

/// Load the static catalog; a missing file yields an empty catalog so
/// maintenance commands that never touch test content still run.
fn load_catalog(path: &str) -> Result<StaticCatalog> {
    if std::path::Path::new(path).exists() {
        StaticCatalog::from_yaml_file(path)
            .with_context(|| format!("Failed to load catalog from {path}"))
    } else {
        tracing::warn!(path, "Catalog file not found, starting with an empty catalog");
        Ok(StaticCatalog::new())
    }
}
