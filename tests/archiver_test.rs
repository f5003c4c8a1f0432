mod helpers;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use appraise::adapters::sqlite::{SqliteResultRepository, SqliteSessionRepository};
use appraise::adapters::{FileArchiveStore, StaticCatalog};
use appraise::domain::errors::{DomainError, DomainResult};
use appraise::domain::models::{
    ArchiveConfig, ArchiveIndexEntry, ArchiveJobStatus, ArchivedResultRecord, TestResult,
};
use appraise::domain::ports::{ArchiveQueue, ArchiveStore};
use appraise::services::{Archiver, SessionService};

use helpers::database::{setup_test_db, teardown_test_db};
use helpers::fixtures::big5_test;

struct Env {
    service: SessionService,
    results: Arc<SqliteResultRepository>,
    store: Arc<FileArchiveStore>,
    archiver: Archiver,
    _dir: TempDir,
}

async fn setup(pool: sqlx::SqlitePool) -> Env {
    let dir = TempDir::new().unwrap();
    let sessions = Arc::new(SqliteSessionRepository::new(pool.clone()));
    let results = Arc::new(SqliteResultRepository::new(pool));
    let store = Arc::new(FileArchiveStore::new(dir.path()));
    let catalog = Arc::new(StaticCatalog::new());
    catalog.insert_test(big5_test()).await;

    let service = SessionService::new(
        sessions,
        results.clone(),
        catalog.clone(),
        Duration::hours(2),
    );
    let archiver = Archiver::new(
        results.clone(),
        results.clone(),
        store.clone(),
        catalog.clone(),
        catalog,
        ArchiveConfig::default(),
    );

    Env {
        service,
        results,
        store,
        archiver,
        _dir: dir,
    }
}

async fn completed_result(env: &Env) -> TestResult {
    let session = env.service.start("big5", Uuid::new_v4()).await.unwrap();
    for i in 1..=5 {
        env.service
            .record_answer(session.id, &format!("q{i}"), 4)
            .await
            .unwrap();
    }
    env.service.complete(session.id, false).await.unwrap()
}

#[tokio::test]
async fn archive_pass_mirrors_committed_results() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone()).await;

    let result = completed_result(&env).await;

    let report = env.archiver.process_pending().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.archived, 1);
    assert_eq!(report.failed, 0);

    let job = ArchiveQueue::get(env.results.as_ref(), result.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, ArchiveJobStatus::Done);

    // Record lands at the deterministic path with denormalized
    // descriptors, and the owner's index points at it.
    let index = env.store.load_index(result.user_id).await.unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].id, result.id);

    let record = env.store.read_record(&index[0].file_path).await.unwrap();
    assert_eq!(record.id, result.id);
    assert_eq!(record.test_type, "personality");
    assert_eq!(record.overall_score, result.overall_score);

    // Nothing pending: the next pass is a no-op.
    let report = env.archiver.process_pending().await.unwrap();
    assert_eq!(report.processed, 0);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn rearchiving_the_same_result_writes_once() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone()).await;

    let result = completed_result(&env).await;
    env.archiver.process_pending().await.unwrap();

    // A crashed worker re-enqueues the job; the record must not
    // duplicate.
    sqlx::query("UPDATE archive_jobs SET status = 'pending' WHERE result_id = ?")
        .bind(result.id.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let report = env.archiver.process_pending().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.archived, 0);
    assert_eq!(report.already_archived, 1);

    let index = env.store.load_index(result.user_id).await.unwrap();
    assert_eq!(index.len(), 1);

    teardown_test_db(pool).await;
}

/// Store that refuses every write.
struct BrokenStore;

#[async_trait]
impl ArchiveStore for BrokenStore {
    async fn write_record(&self, _record: &ArchivedResultRecord) -> DomainResult<bool> {
        Err(DomainError::SerializationError("store offline".into()))
    }

    async fn append_index_entry(
        &self,
        _user_id: Uuid,
        _entry: &ArchiveIndexEntry,
    ) -> DomainResult<()> {
        Err(DomainError::SerializationError("store offline".into()))
    }

    async fn load_index(&self, _user_id: Uuid) -> DomainResult<Vec<ArchiveIndexEntry>> {
        Ok(Vec::new())
    }

    async fn read_record(&self, _file_path: &str) -> DomainResult<ArchivedResultRecord> {
        Err(DomainError::SerializationError("store offline".into()))
    }

    async fn scan_user_records(&self, _user_id: Uuid) -> DomainResult<Vec<ArchivedResultRecord>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn archive_failure_never_touches_the_primary_result() {
    let pool = setup_test_db().await;
    let env = setup(pool.clone()).await;
    let result = completed_result(&env).await;

    let catalog = Arc::new(StaticCatalog::new());
    let broken = Archiver::new(
        env.results.clone(),
        env.results.clone(),
        Arc::new(BrokenStore),
        catalog.clone(),
        catalog,
        ArchiveConfig {
            max_attempts: 2,
            ..ArchiveConfig::default()
        },
    );

    // First pass fails and keeps the job queued.
    let report = broken.process_pending().await.unwrap();
    assert_eq!(report.failed, 1);

    let job = ArchiveQueue::get(env.results.as_ref(), result.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, ArchiveJobStatus::Pending);
    assert_eq!(job.attempts, 1);

    // Second failure reaches max attempts and parks the job.
    let report = broken.process_pending().await.unwrap();
    assert_eq!(report.failed, 1);

    let job = ArchiveQueue::get(env.results.as_ref(), result.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, ArchiveJobStatus::Failed);

    // The authoritative result is untouched throughout.
    use appraise::domain::ports::ResultRepository;
    let stored = ResultRepository::get(env.results.as_ref(), result.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.overall_score, result.overall_score);

    teardown_test_db(pool).await;
}
