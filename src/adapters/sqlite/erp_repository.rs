//! SQLite implementation of the ERP config, employee cache, and sync
//! log repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    EmployeeStatus, ErpConfig, ErpEmployee, ErpSyncLog, SyncRunStatus, SyncStatus, SyncType,
};
use crate::domain::ports::{ErpConfigRepository, ErpEmployeeRepository, ErpSyncLogRepository};

use super::row::{parse_opt_ts, parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteErpRepository {
    pool: SqlitePool,
}

impl SqliteErpRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ErpConfigRepository for SqliteErpRepository {
    async fn create(&self, config: &ErpConfig) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO erp_configs (id, company_id, provider, base_url, login, password,
               sync_status, sync_lease_expires_at, sync_frequency_seconds, last_sync, next_sync,
               employee_count, last_error, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(config.id.to_string())
        .bind(config.company_id.to_string())
        .bind(&config.provider)
        .bind(&config.base_url)
        .bind(&config.login)
        .bind(&config.password)
        .bind(config.sync_status.as_str())
        .bind(config.sync_lease_expires_at.map(|t| t.to_rfc3339()))
        .bind(i64::from(config.sync_frequency_seconds))
        .bind(config.last_sync.map(|t| t.to_rfc3339()))
        .bind(config.next_sync.map(|t| t.to_rfc3339()))
        .bind(i64::from(config.employee_count))
        .bind(&config.last_error)
        .bind(config.created_at.to_rfc3339())
        .bind(config.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ErpConfig>> {
        let row: Option<ErpConfigRow> = sqlx::query_as("SELECT * FROM erp_configs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn claim_sync_lease(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> DomainResult<bool> {
        // Single conditional update acting as the lock. A lapsed lease
        // is reclaimable, so a crashed worker cannot wedge the config.
        let result = sqlx::query(
            r#"UPDATE erp_configs
               SET sync_status = 'syncing', sync_lease_expires_at = ?, last_error = NULL,
                   updated_at = ?
               WHERE id = ?
                 AND (sync_status != 'syncing' OR sync_lease_expires_at IS NULL
                      OR sync_lease_expires_at < ?)"#,
        )
        .bind(lease_until.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(id.to_string())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn finalize_success(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        employee_count: u32,
    ) -> DomainResult<()> {
        let frequency: i64 =
            sqlx::query_scalar("SELECT sync_frequency_seconds FROM erp_configs WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?
                .ok_or(DomainError::ErpConfigNotFound(id))?;

        let next_sync = now + chrono::Duration::seconds(frequency);

        sqlx::query(
            r#"UPDATE erp_configs
               SET sync_status = 'completed', sync_lease_expires_at = NULL,
                   last_sync = ?, next_sync = ?, employee_count = ?, last_error = NULL,
                   updated_at = ?
               WHERE id = ?"#,
        )
        .bind(now.to_rfc3339())
        .bind(next_sync.to_rfc3339())
        .bind(i64::from(employee_count))
        .bind(now.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn finalize_error(&self, id: Uuid, error: &str) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE erp_configs
               SET sync_status = 'error', sync_lease_expires_at = NULL, last_error = ?,
                   updated_at = ?
               WHERE id = ?"#,
        )
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ErpConfigNotFound(id));
        }
        Ok(())
    }

    async fn release_to_idle(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query(
            r#"UPDATE erp_configs
               SET sync_status = 'idle', sync_lease_expires_at = NULL, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn due(&self, now: DateTime<Utc>) -> DomainResult<Vec<ErpConfig>> {
        let rows: Vec<ErpConfigRow> = sqlx::query_as(
            r#"SELECT * FROM erp_configs
               WHERE (next_sync IS NULL OR next_sync <= ?)
                 AND (sync_status != 'syncing' OR sync_lease_expires_at IS NULL
                      OR sync_lease_expires_at < ?)
               ORDER BY next_sync"#,
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl ErpEmployeeRepository for SqliteErpRepository {
    async fn get(&self, config_id: Uuid, external_id: &str) -> DomainResult<Option<ErpEmployee>> {
        let row: Option<ErpEmployeeRow> = sqlx::query_as(
            "SELECT * FROM erp_employees WHERE erp_config_id = ? AND external_id = ?",
        )
        .bind(config_id.to_string())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn upsert(&self, employee: &ErpEmployee) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO erp_employees (erp_config_id, external_id, first_name, last_name,
               email, department, position, status, last_sync_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(erp_config_id, external_id)
               DO UPDATE SET first_name = excluded.first_name,
                             last_name = excluded.last_name,
                             email = excluded.email,
                             department = excluded.department,
                             position = excluded.position,
                             status = excluded.status,
                             last_sync_at = excluded.last_sync_at,
                             updated_at = excluded.updated_at"#,
        )
        .bind(employee.erp_config_id.to_string())
        .bind(&employee.external_id)
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.email)
        .bind(&employee.department)
        .bind(&employee.position)
        .bind(employee.status.as_str())
        .bind(employee.last_sync_at.to_rfc3339())
        .bind(employee.created_at.to_rfc3339())
        .bind(employee.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_last_sync(
        &self,
        config_id: Uuid,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        sqlx::query(
            r#"UPDATE erp_employees SET last_sync_at = ?
               WHERE erp_config_id = ? AND external_id = ?"#,
        )
        .bind(now.to_rfc3339())
        .bind(config_id.to_string())
        .bind(external_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(
        &self,
        config_id: Uuid,
        status: Option<EmployeeStatus>,
    ) -> DomainResult<Vec<ErpEmployee>> {
        let rows: Vec<ErpEmployeeRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    r#"SELECT * FROM erp_employees
                       WHERE erp_config_id = ? AND status = ? ORDER BY external_id"#,
                )
                .bind(config_id.to_string())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT * FROM erp_employees WHERE erp_config_id = ? ORDER BY external_id",
                )
                .bind(config_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_active(&self, config_id: Uuid) -> DomainResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM erp_employees WHERE erp_config_id = ? AND status = 'active'",
        )
        .bind(config_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u32)
    }

    async fn deactivate_unseen(
        &self,
        config_id: Uuid,
        run_started: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let result = sqlx::query(
            r#"UPDATE erp_employees
               SET status = 'inactive', updated_at = ?
               WHERE erp_config_id = ? AND status = 'active' AND last_sync_at < ?"#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(config_id.to_string())
        .bind(run_started.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ErpSyncLogRepository for SqliteErpRepository {
    async fn create(&self, log: &ErpSyncLog) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO erp_sync_logs (id, erp_config_id, sync_type, status, started_at,
               finished_at, created_count, updated_count, deactivated_count, error_count,
               error_message)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(log.id.to_string())
        .bind(log.erp_config_id.to_string())
        .bind(log.sync_type.as_str())
        .bind(log.status.as_str())
        .bind(log.started_at.to_rfc3339())
        .bind(log.finished_at.map(|t| t.to_rfc3339()))
        .bind(i64::from(log.created_count))
        .bind(i64::from(log.updated_count))
        .bind(i64::from(log.deactivated_count))
        .bind(i64::from(log.error_count))
        .bind(&log.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ErpSyncLog>> {
        let row: Option<ErpSyncLogRow> = sqlx::query_as("SELECT * FROM erp_sync_logs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn finalize(&self, log: &ErpSyncLog) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE erp_sync_logs
               SET status = ?, finished_at = ?, created_count = ?, updated_count = ?,
                   deactivated_count = ?, error_count = ?, error_message = ?
               WHERE id = ?"#,
        )
        .bind(log.status.as_str())
        .bind(log.finished_at.map(|t| t.to_rfc3339()))
        .bind(i64::from(log.created_count))
        .bind(i64::from(log.updated_count))
        .bind(i64::from(log.deactivated_count))
        .bind(i64::from(log.error_count))
        .bind(&log.error_message)
        .bind(log.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ValidationFailed(format!(
                "sync log {} does not exist",
                log.id
            )));
        }
        Ok(())
    }

    async fn running_for_config(&self, config_id: Uuid) -> DomainResult<Option<ErpSyncLog>> {
        let row: Option<ErpSyncLogRow> = sqlx::query_as(
            r#"SELECT * FROM erp_sync_logs
               WHERE erp_config_id = ? AND status = 'running'
               ORDER BY started_at DESC LIMIT 1"#,
        )
        .bind(config_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_for_config(&self, config_id: Uuid, limit: u32) -> DomainResult<Vec<ErpSyncLog>> {
        let rows: Vec<ErpSyncLogRow> = sqlx::query_as(
            "SELECT * FROM erp_sync_logs WHERE erp_config_id = ? ORDER BY started_at DESC LIMIT ?",
        )
        .bind(config_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ErpConfigRow {
    id: String,
    company_id: String,
    provider: String,
    base_url: String,
    login: String,
    password: String,
    sync_status: String,
    sync_lease_expires_at: Option<String>,
    sync_frequency_seconds: i64,
    last_sync: Option<String>,
    next_sync: Option<String>,
    employee_count: i64,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ErpConfigRow> for ErpConfig {
    type Error = DomainError;

    fn try_from(row: ErpConfigRow) -> Result<Self, Self::Error> {
        let sync_status = SyncStatus::from_str(&row.sync_status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid sync status: {}", row.sync_status))
        })?;

        Ok(ErpConfig {
            id: parse_uuid(&row.id)?,
            company_id: parse_uuid(&row.company_id)?,
            provider: row.provider,
            base_url: row.base_url,
            login: row.login,
            password: row.password,
            sync_status,
            sync_lease_expires_at: parse_opt_ts(row.sync_lease_expires_at.as_deref())?,
            sync_frequency_seconds: row.sync_frequency_seconds as u32,
            last_sync: parse_opt_ts(row.last_sync.as_deref())?,
            next_sync: parse_opt_ts(row.next_sync.as_deref())?,
            employee_count: row.employee_count as u32,
            last_error: row.last_error,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ErpEmployeeRow {
    erp_config_id: String,
    external_id: String,
    first_name: String,
    last_name: String,
    email: String,
    department: Option<String>,
    position: Option<String>,
    status: String,
    last_sync_at: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ErpEmployeeRow> for ErpEmployee {
    type Error = DomainError;

    fn try_from(row: ErpEmployeeRow) -> Result<Self, Self::Error> {
        let status = EmployeeStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid employee status: {}", row.status))
        })?;

        Ok(ErpEmployee {
            erp_config_id: parse_uuid(&row.erp_config_id)?,
            external_id: row.external_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            department: row.department,
            position: row.position,
            status,
            last_sync_at: parse_ts(&row.last_sync_at)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ErpSyncLogRow {
    id: String,
    erp_config_id: String,
    sync_type: String,
    status: String,
    started_at: String,
    finished_at: Option<String>,
    created_count: i64,
    updated_count: i64,
    deactivated_count: i64,
    error_count: i64,
    error_message: Option<String>,
}

impl TryFrom<ErpSyncLogRow> for ErpSyncLog {
    type Error = DomainError;

    fn try_from(row: ErpSyncLogRow) -> Result<Self, Self::Error> {
        let sync_type = SyncType::from_str(&row.sync_type).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid sync type: {}", row.sync_type))
        })?;
        let status = SyncRunStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid run status: {}", row.status))
        })?;

        Ok(ErpSyncLog {
            id: parse_uuid(&row.id)?,
            erp_config_id: parse_uuid(&row.erp_config_id)?,
            sync_type,
            status,
            started_at: parse_ts(&row.started_at)?,
            finished_at: parse_opt_ts(row.finished_at.as_deref())?,
            created_count: row.created_count as u32,
            updated_count: row.updated_count as u32,
            deactivated_count: row.deactivated_count as u32,
            error_count: row.error_count as u32,
            error_message: row.error_message,
        })
    }
}
