//! External roster synchronization engine.
//!
//! Pulls employee rosters from the configured HR connector into the
//! local cache. At most one run is in flight per config, enforced by a
//! leased lock on the config row: a crashed worker's claim lapses with
//! its lease instead of wedging the config in `syncing` forever.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    EmployeeStatus, ErpConfig, ErpSyncLog, RemoteEmployee, SyncConfig, SyncReport, SyncRunStatus,
    SyncType,
};
use crate::domain::ports::{
    ErpConfigRepository, ErpConnectorFactory, ErpEmployeeRepository, ErpSyncLogRepository,
};

/// Drives sync runs for ERP configs.
pub struct ErpSyncEngine {
    configs: Arc<dyn ErpConfigRepository>,
    employees: Arc<dyn ErpEmployeeRepository>,
    logs: Arc<dyn ErpSyncLogRepository>,
    connectors: Arc<dyn ErpConnectorFactory>,
    settings: SyncConfig,
}

impl ErpSyncEngine {
    pub fn new(
        configs: Arc<dyn ErpConfigRepository>,
        employees: Arc<dyn ErpEmployeeRepository>,
        logs: Arc<dyn ErpSyncLogRepository>,
        connectors: Arc<dyn ErpConnectorFactory>,
        settings: SyncConfig,
    ) -> Self {
        Self {
            configs,
            employees,
            logs,
            connectors,
            settings,
        }
    }

    /// Claim the config's sync lock and open a running log.
    ///
    /// Fails fast with `SyncInProgress` when another run holds a live
    /// lease; requests are never queued.
    #[instrument(skip(self), err)]
    pub async fn start_sync(&self, config_id: Uuid, sync_type: SyncType) -> DomainResult<ErpSyncLog> {
        let config = self.require_config(config_id).await?;

        let now = Utc::now();
        let lease_until = now + Duration::seconds(i64::from(self.settings.lease_seconds));
        let claimed = self
            .configs
            .claim_sync_lease(config.id, now, lease_until)
            .await?;

        if !claimed {
            return Err(DomainError::SyncInProgress(config_id));
        }

        let log = ErpSyncLog::start(config_id, sync_type);
        self.logs.create(&log).await?;

        info!(config_id = %config_id, log_id = %log.id, sync_type = sync_type.as_str(), "Sync started");
        Ok(log)
    }

    /// Run a full sync cycle: claim, fetch, upsert, finalize.
    ///
    /// Returns the finalized log. A failed run is a normal return (the
    /// log carries the terminal status); only the conflict on claim and
    /// repository failures surface as errors.
    #[instrument(skip(self), err)]
    pub async fn run_sync(&self, config_id: Uuid, sync_type: SyncType) -> DomainResult<ErpSyncLog> {
        let mut log = self.start_sync(config_id, sync_type).await?;
        let config = self.require_config(config_id).await?;

        match self.execute(&config, sync_type).await {
            Ok(report) => {
                let now = Utc::now();
                log.status = SyncRunStatus::Completed;
                log.finished_at = Some(now);
                log.created_count = report.created;
                log.updated_count = report.updated;
                log.deactivated_count = report.deactivated;
                log.error_count = report.errors;
                self.logs.finalize(&log).await?;

                let employee_count = self.employees.count_active(config_id).await?;
                self.configs
                    .finalize_success(config_id, now, employee_count)
                    .await?;

                info!(
                    config_id = %config_id,
                    created = report.created,
                    updated = report.updated,
                    deactivated = report.deactivated,
                    errors = report.errors,
                    "Sync completed"
                );
            }
            Err(e) => {
                error!(config_id = %config_id, error = %e, "Sync failed");
                log.status = SyncRunStatus::Failed;
                log.finished_at = Some(Utc::now());
                log.error_message = Some(e.to_string());
                self.logs.finalize(&log).await?;
                self.configs.finalize_error(config_id, &e.to_string()).await?;
            }
        }

        Ok(log)
    }

    /// Cancel the running sync for a config.
    ///
    /// The log reaches its cancelled terminal state and the lease is
    /// released; employee rows already upserted stay as they are.
    #[instrument(skip(self), err)]
    pub async fn cancel_sync(&self, config_id: Uuid) -> DomainResult<ErpSyncLog> {
        let mut log = self
            .logs
            .running_for_config(config_id)
            .await?
            .ok_or_else(|| {
                DomainError::ValidationFailed(format!("no running sync for config {config_id}"))
            })?;

        log.status = SyncRunStatus::Cancelled;
        log.finished_at = Some(Utc::now());
        self.logs.finalize(&log).await?;
        self.configs.release_to_idle(config_id).await?;

        info!(config_id = %config_id, log_id = %log.id, "Sync cancelled");
        Ok(log)
    }

    /// Configs whose `next_sync` has passed, for the scheduler.
    pub async fn due_configs(&self, now: DateTime<Utc>) -> DomainResult<Vec<ErpConfig>> {
        self.configs.due(now).await
    }

    /// Fetch and upsert phases.
    async fn execute(&self, config: &ErpConfig, sync_type: SyncType) -> DomainResult<SyncReport> {
        let connector = self.connectors.create(config)?;

        connector
            .authenticate(&config.login, &config.password)
            .await?;

        let roster = connector.list_employees().await?;
        let run_started = Utc::now();

        let mut report = SyncReport::default();
        for remote in &roster {
            match self.upsert_remote(config.id, remote, run_started).await? {
                UpsertOutcome::Created => report.created += 1,
                UpsertOutcome::Updated => report.updated += 1,
                UpsertOutcome::Unchanged => {}
                UpsertOutcome::Rejected => report.errors += 1,
            }
        }

        // Only a full pull proves absence; incremental pulls never
        // deactivate.
        if sync_type == SyncType::Full {
            report.deactivated = self
                .employees
                .deactivate_unseen(config.id, run_started)
                .await? as u32;
        }

        Ok(report)
    }

    /// Upsert one remote record into the cache.
    async fn upsert_remote(
        &self,
        config_id: Uuid,
        remote: &RemoteEmployee,
        now: DateTime<Utc>,
    ) -> DomainResult<UpsertOutcome> {
        if remote.external_id.trim().is_empty() {
            warn!(config_id = %config_id, "Skipping roster row without external id");
            return Ok(UpsertOutcome::Rejected);
        }

        match self.employees.get(config_id, &remote.external_id).await? {
            None => {
                let employee = remote.clone().into_employee(config_id, now);
                self.employees.upsert(&employee).await?;
                Ok(UpsertOutcome::Created)
            }
            Some(mut existing) => {
                let reactivated = existing.status == EmployeeStatus::Inactive;
                if existing.differs_from(remote) || reactivated {
                    existing.apply_remote(remote, now);
                    self.employees.upsert(&existing).await?;
                    Ok(UpsertOutcome::Updated)
                } else {
                    // Unchanged rows only get their sync stamp bumped,
                    // keeping re-runs of an identical roster at zero
                    // created/updated.
                    self.employees
                        .touch_last_sync(config_id, &remote.external_id, now)
                        .await?;
                    Ok(UpsertOutcome::Unchanged)
                }
            }
        }
    }

    async fn require_config(&self, config_id: Uuid) -> DomainResult<ErpConfig> {
        self.configs
            .get(config_id)
            .await?
            .ok_or(DomainError::ErpConfigNotFound(config_id))
    }
}

enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
    Rejected,
}
