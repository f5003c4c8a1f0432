//! ERP config, employee cache, and sync log repository ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EmployeeStatus, ErpConfig, ErpEmployee, ErpSyncLog};

/// Persistence contract for per-company connector configs, including
/// the leased sync lock.
#[async_trait]
pub trait ErpConfigRepository: Send + Sync {
    async fn create(&self, config: &ErpConfig) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<ErpConfig>>;

    /// Claim the sync lock with a lease: a single conditional update
    /// that succeeds only when the config is not syncing, or its lease
    /// has lapsed (a crashed worker's lock is reclaimable). Returns
    /// whether the claim won.
    async fn claim_sync_lease(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Finalize a successful run: status completed, `last_sync = now`,
    /// `next_sync = now + frequency`, employee count refreshed, lease
    /// released.
    async fn finalize_success(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        employee_count: u32,
    ) -> DomainResult<()>;

    /// Finalize a failed run: status error, `last_error` recorded,
    /// lease released.
    async fn finalize_error(&self, id: Uuid, error: &str) -> DomainResult<()>;

    /// Release the lease and return to idle (cancellation path).
    async fn release_to_idle(&self, id: Uuid) -> DomainResult<()>;

    /// Configs whose `next_sync` has passed and are not mid-run, for
    /// the scheduler.
    async fn due(&self, now: DateTime<Utc>) -> DomainResult<Vec<ErpConfig>>;
}

/// Persistence contract for the local employee cache.
#[async_trait]
pub trait ErpEmployeeRepository: Send + Sync {
    async fn get(&self, config_id: Uuid, external_id: &str) -> DomainResult<Option<ErpEmployee>>;

    /// Insert or replace the row keyed (config, external id).
    async fn upsert(&self, employee: &ErpEmployee) -> DomainResult<()>;

    /// Bump `last_sync_at` without touching mirrored fields.
    async fn touch_last_sync(
        &self,
        config_id: Uuid,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()>;

    async fn list(
        &self,
        config_id: Uuid,
        status: Option<EmployeeStatus>,
    ) -> DomainResult<Vec<ErpEmployee>>;

    async fn count_active(&self, config_id: Uuid) -> DomainResult<u32>;

    /// Flip active rows untouched by the current run (i.e. with
    /// `last_sync_at` older than `run_started`) to inactive. Rows are
    /// never deleted. Returns the number deactivated.
    async fn deactivate_unseen(
        &self,
        config_id: Uuid,
        run_started: DateTime<Utc>,
    ) -> DomainResult<u64>;
}

/// Persistence contract for per-run sync logs.
#[async_trait]
pub trait ErpSyncLogRepository: Send + Sync {
    async fn create(&self, log: &ErpSyncLog) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<ErpSyncLog>>;

    /// Finalize a run with its terminal status and counts.
    async fn finalize(&self, log: &ErpSyncLog) -> DomainResult<()>;

    /// The running log for a config, if any.
    async fn running_for_config(&self, config_id: Uuid) -> DomainResult<Option<ErpSyncLog>>;

    async fn list_for_config(&self, config_id: Uuid, limit: u32) -> DomainResult<Vec<ErpSyncLog>>;
}
