//! ERP roster synchronization models.
//!
//! The external HR system is the source of truth for employee rosters;
//! these models describe the per-company connector configuration, the
//! local employee cache it feeds, and the per-run sync log.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sync state of an [`ErpConfig`].
///
/// `Syncing` doubles as a lock, but a leased one: a config stuck in
/// `Syncing` past `sync_lease_expires_at` is reclaimable by the next
/// start request instead of staying wedged forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Completed,
    Error,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "syncing" => Some(Self::Syncing),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Per-company connector settings and sync bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpConfig {
    pub id: Uuid,
    pub company_id: Uuid,
    /// Connector implementation selector, e.g. "onec" or "sap".
    pub provider: String,
    pub base_url: String,
    pub login: String,
    pub password: String,
    pub sync_status: SyncStatus,
    /// Lease on the Syncing state; reclaimable once past.
    pub sync_lease_expires_at: Option<DateTime<Utc>>,
    pub sync_frequency_seconds: u32,
    pub last_sync: Option<DateTime<Utc>>,
    pub next_sync: Option<DateTime<Utc>>,
    pub employee_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ErpConfig {
    pub fn new(company_id: Uuid, provider: String, base_url: String, login: String, password: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_id,
            provider,
            base_url,
            login,
            password,
            sync_status: SyncStatus::Idle,
            sync_lease_expires_at: None,
            sync_frequency_seconds: 86_400,
            last_sync: None,
            next_sync: None,
            employee_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn sync_frequency(&self) -> Duration {
        Duration::seconds(i64::from(self.sync_frequency_seconds))
    }

    /// Whether the Syncing lock is currently held, i.e. claimed and the
    /// lease has not yet lapsed at `now`.
    pub fn holds_live_lease(&self, now: DateTime<Utc>) -> bool {
        self.sync_status == SyncStatus::Syncing
            && self.sync_lease_expires_at.is_some_and(|lease| lease > now)
    }
}

/// Status of a cached employee row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeStatus {
    Active,
    /// Absent from the last full roster pull. Rows are never deleted so
    /// invitation provenance survives.
    Inactive,
}

impl EmployeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Locally cached mirror of a remote employee, keyed by
/// (erp_config_id, external_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpEmployee {
    pub erp_config_id: Uuid,
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub status: EmployeeStatus,
    pub last_sync_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ErpEmployee {
    /// Whether the mirrored fields differ from a remote record.
    ///
    /// Drives the updated-vs-unchanged distinction in sync counts: an
    /// unchanged row only gets its `last_sync_at` bumped.
    pub fn differs_from(&self, remote: &RemoteEmployee) -> bool {
        self.first_name != remote.first_name
            || self.last_name != remote.last_name
            || self.email != remote.email
            || self.department != remote.department
            || self.position != remote.position
    }

    /// Copy the mirrored fields from a remote record.
    pub fn apply_remote(&mut self, remote: &RemoteEmployee, now: DateTime<Utc>) {
        self.first_name = remote.first_name.clone();
        self.last_name = remote.last_name.clone();
        self.email = remote.email.clone();
        self.department = remote.department.clone();
        self.position = remote.position.clone();
        self.status = EmployeeStatus::Active;
        self.last_sync_at = now;
        self.updated_at = now;
    }
}

/// An employee record as returned by the external connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEmployee {
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: Option<String>,
    pub position: Option<String>,
}

impl RemoteEmployee {
    /// Materialize a fresh cache row from this remote record.
    pub fn into_employee(self, erp_config_id: Uuid, now: DateTime<Utc>) -> ErpEmployee {
        ErpEmployee {
            erp_config_id,
            external_id: self.external_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            department: self.department,
            position: self.position,
            status: EmployeeStatus::Active,
            last_sync_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Kind of sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// Complete roster pull; absent employees are deactivated.
    Full,
    /// Partial pull; absence means nothing, deactivation is skipped.
    Incremental,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "incremental" => Some(Self::Incremental),
            _ => None,
        }
    }
}

/// Terminal or running state of a sync log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One row per sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpSyncLog {
    pub id: Uuid,
    pub erp_config_id: Uuid,
    pub sync_type: SyncType,
    pub status: SyncRunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_count: u32,
    pub updated_count: u32,
    pub deactivated_count: u32,
    pub error_count: u32,
    pub error_message: Option<String>,
}

impl ErpSyncLog {
    pub fn start(erp_config_id: Uuid, sync_type: SyncType) -> Self {
        Self {
            id: Uuid::new_v4(),
            erp_config_id,
            sync_type,
            status: SyncRunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            created_count: 0,
            updated_count: 0,
            deactivated_count: 0,
            error_count: 0,
            error_message: None,
        }
    }
}

/// Counts accumulated over one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: u32,
    pub updated: u32,
    pub deactivated: u32,
    pub errors: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(external_id: &str) -> RemoteEmployee {
        RemoteEmployee {
            external_id: external_id.to_string(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            department: Some("Engineering".into()),
            position: None,
        }
    }

    #[test]
    fn unchanged_remote_does_not_differ() {
        let now = Utc::now();
        let employee = remote("e-1").into_employee(Uuid::new_v4(), now);
        assert!(!employee.differs_from(&remote("e-1")));

        let mut changed = remote("e-1");
        changed.department = Some("Research".into());
        assert!(employee.differs_from(&changed));
    }

    #[test]
    fn lapsed_lease_is_not_live() {
        let mut config = ErpConfig::new(
            Uuid::new_v4(),
            "onec".into(),
            "https://erp.example.com".into(),
            "svc".into(),
            "secret".into(),
        );
        config.sync_status = SyncStatus::Syncing;
        config.sync_lease_expires_at = Some(Utc::now() - Duration::minutes(5));
        assert!(!config.holds_live_lease(Utc::now()));

        config.sync_lease_expires_at = Some(Utc::now() + Duration::minutes(5));
        assert!(config.holds_live_lease(Utc::now()));
    }
}
