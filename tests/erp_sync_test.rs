mod helpers;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use appraise::adapters::sqlite::SqliteErpRepository;
use appraise::domain::errors::{DomainError, DomainResult};
use appraise::domain::models::{
    EmployeeStatus, ErpConfig, RemoteEmployee, SyncConfig, SyncRunStatus, SyncStatus, SyncType,
};
use appraise::domain::ports::{
    ErpConfigRepository, ErpConnector, ErpConnectorFactory, ErpEmployeeRepository,
};
use appraise::services::ErpSyncEngine;

use helpers::database::{setup_test_db, teardown_test_db};
use helpers::fixtures::remote_employee;

/// Connector serving a configurable in-memory roster.
struct MockConnector {
    roster: Arc<Mutex<Vec<RemoteEmployee>>>,
    reject_auth: bool,
}

#[async_trait]
impl ErpConnector for MockConnector {
    async fn authenticate(&self, login: &str, _password: &str) -> DomainResult<()> {
        if self.reject_auth {
            return Err(DomainError::AuthenticationFailed(format!(
                "login rejected for '{login}'"
            )));
        }
        Ok(())
    }

    async fn list_employees(&self) -> DomainResult<Vec<RemoteEmployee>> {
        Ok(self.roster.lock().await.clone())
    }
}

struct MockFactory {
    roster: Arc<Mutex<Vec<RemoteEmployee>>>,
    reject_auth: bool,
}

impl ErpConnectorFactory for MockFactory {
    fn create(&self, _config: &ErpConfig) -> DomainResult<Box<dyn ErpConnector>> {
        Ok(Box::new(MockConnector {
            roster: self.roster.clone(),
            reject_auth: self.reject_auth,
        }))
    }
}

struct Env {
    engine: ErpSyncEngine,
    repo: Arc<SqliteErpRepository>,
    roster: Arc<Mutex<Vec<RemoteEmployee>>>,
    config: ErpConfig,
}

async fn setup(pool: sqlx::SqlitePool, reject_auth: bool) -> Env {
    let repo = Arc::new(SqliteErpRepository::new(pool));
    let roster = Arc::new(Mutex::new(Vec::new()));

    let config = ErpConfig::new(
        Uuid::new_v4(),
        "onec".into(),
        "https://erp.example.com".into(),
        "svc".into(),
        "secret".into(),
    );
    ErpConfigRepository::create(repo.as_ref(), &config)
        .await
        .unwrap();

    let engine = ErpSyncEngine::new(
        repo.clone(),
        repo.clone(),
        repo.clone(),
        Arc::new(MockFactory {
            roster: roster.clone(),
            reject_auth,
        }),
        SyncConfig::default(),
    );

    Env {
        engine,
        repo,
        roster,
        config,
    }
}

#[tokio::test]
async fn full_sync_creates_then_stays_quiet_on_identical_reruns() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone(), false).await;

    *env.roster.lock().await = vec![
        remote_employee("e-1", "one@x.com"),
        remote_employee("e-2", "two@x.com"),
    ];

    let log = env
        .engine
        .run_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();
    assert_eq!(log.status, SyncRunStatus::Completed);
    assert_eq!(log.created_count, 2);
    assert_eq!(log.updated_count, 0);
    assert_eq!(log.deactivated_count, 0);

    let config = ErpConfigRepository::get(env.repo.as_ref(), env.config.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(config.sync_status, SyncStatus::Completed);
    assert_eq!(config.employee_count, 2);
    assert!(config.last_sync.is_some());
    assert!(config.next_sync.is_some());
    assert!(config.sync_lease_expires_at.is_none());

    // An unchanged roster re-run touches nothing but the sync stamps.
    let before = ErpEmployeeRepository::list(env.repo.as_ref(), env.config.id, None)
        .await
        .unwrap();
    let log = env
        .engine
        .run_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();
    assert_eq!(log.created_count, 0);
    assert_eq!(log.updated_count, 0);
    assert_eq!(log.deactivated_count, 0);

    let after = ErpEmployeeRepository::list(env.repo.as_ref(), env.config.id, None)
        .await
        .unwrap();
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.email, a.email);
        assert!(a.last_sync_at >= b.last_sync_at);
    }

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn changed_fields_count_as_updates() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone(), false).await;

    *env.roster.lock().await = vec![remote_employee("e-1", "one@x.com")];
    env.engine
        .run_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();

    let mut changed = remote_employee("e-1", "one@x.com");
    changed.department = Some("Research".into());
    *env.roster.lock().await = vec![changed];

    let log = env
        .engine
        .run_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();
    assert_eq!(log.created_count, 0);
    assert_eq!(log.updated_count, 1);

    let employee = ErpEmployeeRepository::get(env.repo.as_ref(), env.config.id, "e-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(employee.department.as_deref(), Some("Research"));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn full_pull_deactivates_absent_employees_but_never_deletes() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone(), false).await;

    *env.roster.lock().await = vec![
        remote_employee("e-1", "one@x.com"),
        remote_employee("e-2", "two@x.com"),
    ];
    env.engine
        .run_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();

    // e-2 disappears from the roster.
    *env.roster.lock().await = vec![remote_employee("e-1", "one@x.com")];
    let log = env
        .engine
        .run_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();
    assert_eq!(log.deactivated_count, 1);

    let gone = ErpEmployeeRepository::get(env.repo.as_ref(), env.config.id, "e-2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(gone.status, EmployeeStatus::Inactive);

    // Reappearing on a later pull reactivates as an update.
    *env.roster.lock().await = vec![
        remote_employee("e-1", "one@x.com"),
        remote_employee("e-2", "two@x.com"),
    ];
    let log = env
        .engine
        .run_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();
    assert_eq!(log.updated_count, 1);

    let back = ErpEmployeeRepository::get(env.repo.as_ref(), env.config.id, "e-2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(back.status, EmployeeStatus::Active);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn incremental_pull_skips_deactivation() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone(), false).await;

    *env.roster.lock().await = vec![
        remote_employee("e-1", "one@x.com"),
        remote_employee("e-2", "two@x.com"),
    ];
    env.engine
        .run_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();

    // A partial pull containing only e-1 proves nothing about e-2.
    *env.roster.lock().await = vec![remote_employee("e-1", "one@x.com")];
    let log = env
        .engine
        .run_sync(env.config.id, SyncType::Incremental)
        .await
        .unwrap();
    assert_eq!(log.deactivated_count, 0);

    let untouched = ErpEmployeeRepository::get(env.repo.as_ref(), env.config.id, "e-2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status, EmployeeStatus::Active);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn concurrent_start_fails_fast_with_conflict() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone(), false).await;

    let first = env
        .engine
        .start_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();
    assert_eq!(first.status, SyncRunStatus::Running);

    let second = env.engine.start_sync(env.config.id, SyncType::Full).await;
    assert!(matches!(second, Err(DomainError::SyncInProgress(id)) if id == env.config.id));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn lapsed_lease_is_reclaimed_by_the_next_start() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone(), false).await;

    env.engine
        .start_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();

    // Simulate the worker crashing: the lease lapses without a
    // finalize.
    sqlx::query("UPDATE erp_configs SET sync_lease_expires_at = ? WHERE id = ?")
        .bind((Utc::now() - Duration::minutes(1)).to_rfc3339())
        .bind(env.config.id.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let reclaimed = env.engine.start_sync(env.config.id, SyncType::Full).await;
    assert!(reclaimed.is_ok());

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn auth_failure_is_terminal_for_the_run() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone(), true).await;

    *env.roster.lock().await = vec![remote_employee("e-1", "one@x.com")];

    let log = env
        .engine
        .run_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();
    assert_eq!(log.status, SyncRunStatus::Failed);
    assert!(log.error_message.as_deref().unwrap_or("").contains("rejected"));

    let config = ErpConfigRepository::get(env.repo.as_ref(), env.config.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(config.sync_status, SyncStatus::Error);
    assert!(config.last_error.is_some());
    assert!(config.sync_lease_expires_at.is_none());

    // Nothing was cached.
    let employees = ErpEmployeeRepository::list(env.repo.as_ref(), env.config.id, None)
        .await
        .unwrap();
    assert!(employees.is_empty());

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn cancellation_keeps_already_upserted_rows() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone(), false).await;

    let log = env
        .engine
        .start_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();

    // Rows upserted mid-run stay after cancellation.
    let employee = remote_employee("e-1", "one@x.com").into_employee(env.config.id, Utc::now());
    ErpEmployeeRepository::upsert(env.repo.as_ref(), &employee)
        .await
        .unwrap();

    let cancelled = env.engine.cancel_sync(env.config.id).await.unwrap();
    assert_eq!(cancelled.id, log.id);
    assert_eq!(cancelled.status, SyncRunStatus::Cancelled);

    let config = ErpConfigRepository::get(env.repo.as_ref(), env.config.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(config.sync_status, SyncStatus::Idle);

    let kept = ErpEmployeeRepository::get(env.repo.as_ref(), env.config.id, "e-1")
        .await
        .unwrap();
    assert!(kept.is_some());

    // A terminal log cannot be cancelled twice.
    let err = env.engine.cancel_sync(env.config.id).await;
    assert!(matches!(err, Err(DomainError::ValidationFailed(_))));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn malformed_roster_rows_are_counted_not_fatal() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone(), false).await;

    *env.roster.lock().await = vec![
        remote_employee("", "ghost@x.com"),
        remote_employee("e-1", "one@x.com"),
    ];

    let log = env
        .engine
        .run_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();
    assert_eq!(log.status, SyncRunStatus::Completed);
    assert_eq!(log.created_count, 1);
    assert_eq!(log.error_count, 1);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn completed_configs_become_due_after_frequency() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone(), false).await;

    env.engine
        .run_sync(env.config.id, SyncType::Full)
        .await
        .unwrap();

    // Right after a run the config is not due.
    let due = env.engine.due_configs(Utc::now()).await.unwrap();
    assert!(due.is_empty());

    // Past next_sync it shows up again.
    let later = Utc::now() + Duration::seconds(i64::from(env.config.sync_frequency_seconds) + 60);
    let due = env.engine.due_configs(later).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, env.config.id);

    teardown_test_db(pool).await;
}
