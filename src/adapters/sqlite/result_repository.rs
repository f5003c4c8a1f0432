//! SQLite implementation of the ResultRepository and ArchiveQueue.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ArchiveJob, ArchiveJobStatus, ResultFilters, ResultMetadata, TestResult, TestSession,
};
use crate::domain::ports::{ArchiveQueue, ResultRepository};

use super::row::{parse_opt_ts, parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteResultRepository {
    pool: SqlitePool,
}

impl SqliteResultRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultRepository for SqliteResultRepository {
    async fn commit_completion(
        &self,
        session: &TestSession,
        result: &TestResult,
    ) -> DomainResult<()> {
        let dimension_scores = serde_json::to_string(&result.dimension_scores)?;
        let metadata = serde_json::to_string(&result.metadata)?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        // Guarded flip: only a writable session completes. Losing the
        // guard aborts the whole transaction, so a completed session
        // without a result cannot exist.
        let flipped = sqlx::query(
            r#"UPDATE test_sessions
               SET status = 'completed', completed_at = ?, time_spent_seconds = ?
               WHERE id = ? AND status IN ('pending', 'in_progress')"#,
        )
        .bind(result.completed_at.to_rfc3339())
        .bind(result.duration_seconds as i64)
        .bind(session.id.to_string())
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::SessionClosed {
                session_id: session.id,
                status: session.status.as_str().to_string(),
            });
        }

        sqlx::query(
            r#"INSERT INTO test_results (id, session_id, user_id, test_id, overall_score,
               dimension_scores, duration_seconds, completed_at, metadata)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(result.id.to_string())
        .bind(result.session_id.to_string())
        .bind(result.user_id.to_string())
        .bind(&result.test_id)
        .bind(i64::from(result.overall_score))
        .bind(&dimension_scores)
        .bind(result.duration_seconds as i64)
        .bind(result.completed_at.to_rfc3339())
        .bind(&metadata)
        .execute(&mut *tx)
        .await?;

        // Archive outbox row, consumed asynchronously by the archiver.
        sqlx::query(
            r#"INSERT INTO archive_jobs (result_id, status, attempts, created_at, updated_at)
               VALUES (?, 'pending', 0, ?, ?)"#,
        )
        .bind(result.id.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<TestResult>> {
        let row: Option<ResultRow> = sqlx::query_as("SELECT * FROM test_results WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_session(&self, session_id: Uuid) -> DomainResult<Option<TestResult>> {
        let row: Option<ResultRow> =
            sqlx::query_as("SELECT * FROM test_results WHERE session_id = ?")
                .bind(session_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        filters: &ResultFilters,
    ) -> DomainResult<Vec<TestResult>> {
        let mut query = String::from("SELECT * FROM test_results WHERE user_id = ?");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(ref test_id) = filters.test_id {
            query.push_str(" AND test_id = ?");
            bindings.push(test_id.clone());
        }
        if let Some(after) = filters.completed_after {
            query.push_str(" AND completed_at >= ?");
            bindings.push(after.to_rfc3339());
        }
        if let Some(before) = filters.completed_before {
            query.push_str(" AND completed_at <= ?");
            bindings.push(before.to_rfc3339());
        }

        query.push_str(" ORDER BY completed_at DESC");

        if let Some(limit) = filters.limit {
            query.push_str(" LIMIT ?");
            bindings.push(limit.to_string());
        }

        let mut q = sqlx::query_as::<_, ResultRow>(&query).bind(user_id.to_string());
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<ResultRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl ArchiveQueue for SqliteResultRepository {
    async fn pending(&self, limit: u32) -> DomainResult<Vec<ArchiveJob>> {
        let rows: Vec<ArchiveJobRow> = sqlx::query_as(
            "SELECT * FROM archive_jobs WHERE status = 'pending' ORDER BY created_at LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn mark_done(&self, result_id: Uuid) -> DomainResult<()> {
        sqlx::query("UPDATE archive_jobs SET status = 'done', updated_at = ? WHERE result_id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(result_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_failure(
        &self,
        result_id: Uuid,
        error: &str,
        max_attempts: u32,
    ) -> DomainResult<()> {
        sqlx::query(
            r#"UPDATE archive_jobs
               SET attempts = attempts + 1,
                   last_error = ?,
                   status = CASE WHEN attempts + 1 >= ? THEN 'failed' ELSE 'pending' END,
                   updated_at = ?
               WHERE result_id = ?"#,
        )
        .bind(error)
        .bind(i64::from(max_attempts))
        .bind(Utc::now().to_rfc3339())
        .bind(result_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, result_id: Uuid) -> DomainResult<Option<ArchiveJob>> {
        let row: Option<ArchiveJobRow> =
            sqlx::query_as("SELECT * FROM archive_jobs WHERE result_id = ?")
                .bind(result_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct ResultRow {
    id: String,
    session_id: String,
    user_id: String,
    test_id: String,
    overall_score: i64,
    dimension_scores: String,
    duration_seconds: i64,
    completed_at: String,
    metadata: String,
}

impl TryFrom<ResultRow> for TestResult {
    type Error = DomainError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        let dimension_scores: BTreeMap<String, f64> = serde_json::from_str(&row.dimension_scores)?;
        let metadata: ResultMetadata = serde_json::from_str(&row.metadata)?;

        Ok(TestResult {
            id: parse_uuid(&row.id)?,
            session_id: parse_uuid(&row.session_id)?,
            user_id: parse_uuid(&row.user_id)?,
            test_id: row.test_id,
            overall_score: row.overall_score as u8,
            dimension_scores,
            duration_seconds: row.duration_seconds as u32,
            completed_at: parse_ts(&row.completed_at)?,
            metadata,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ArchiveJobRow {
    result_id: String,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ArchiveJobRow> for ArchiveJob {
    type Error = DomainError;

    fn try_from(row: ArchiveJobRow) -> Result<Self, Self::Error> {
        let status = ArchiveJobStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid job status: {}", row.status))
        })?;

        Ok(ArchiveJob {
            result_id: parse_uuid(&row.result_id)?,
            status,
            attempts: row.attempts as u32,
            last_error: row.last_error,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        all_embedded_migrations, create_test_pool, Migrator, SqliteSessionRepository,
    };
    use crate::domain::models::SessionStatus;
    use crate::domain::ports::SessionRepository;
    use chrono::Duration;

    async fn setup() -> (SqliteSessionRepository, SqliteResultRepository) {
        let pool = create_test_pool().await.unwrap();
        let migrator = Migrator::new(pool.clone());
        migrator
            .run_embedded_migrations(all_embedded_migrations())
            .await
            .unwrap();
        (
            SqliteSessionRepository::new(pool.clone()),
            SqliteResultRepository::new(pool),
        )
    }

    fn result_for(session: &TestSession) -> TestResult {
        TestResult {
            id: Uuid::new_v4(),
            session_id: session.id,
            user_id: session.user_id,
            test_id: session.test_id.clone(),
            overall_score: 65,
            dimension_scores: BTreeMap::from([("openness".to_string(), 65.0)]),
            duration_seconds: 540,
            completed_at: Utc::now(),
            metadata: ResultMetadata::default(),
        }
    }

    #[tokio::test]
    async fn test_commit_completion_flips_session_and_enqueues_archive() {
        let (sessions, results) = setup().await;
        let session = TestSession::new("big5".into(), Uuid::new_v4(), 5, Duration::hours(2));
        sessions.create(&session).await.unwrap();

        let result = result_for(&session);
        results.commit_completion(&session, &result).await.unwrap();

        let stored = sessions.get(session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert!(stored.completed_at.is_some());

        let stored_result = results.get_by_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored_result.id, result.id);

        let job = ArchiveQueue::get(&results, result.id).await.unwrap().unwrap();
        assert_eq!(job.status, ArchiveJobStatus::Pending);
    }

    #[tokio::test]
    async fn test_commit_completion_rejects_closed_session() {
        let (sessions, results) = setup().await;
        let mut session = TestSession::new("big5".into(), Uuid::new_v4(), 5, Duration::hours(2));
        sessions.create(&session).await.unwrap();

        let first = result_for(&session);
        results.commit_completion(&session, &first).await.unwrap();

        // A second completion attempt loses the guard and leaves no
        // orphan result behind.
        session.status = SessionStatus::Completed;
        let second = result_for(&session);
        let err = results.commit_completion(&session, &second).await;
        assert!(matches!(err, Err(DomainError::SessionClosed { .. })));
        assert!(ResultRepository::get(&results, second.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_record_failure_parks_after_max_attempts() {
        let (sessions, results) = setup().await;
        let session = TestSession::new("big5".into(), Uuid::new_v4(), 5, Duration::hours(2));
        sessions.create(&session).await.unwrap();
        let result = result_for(&session);
        results.commit_completion(&session, &result).await.unwrap();

        results.record_failure(result.id, "disk full", 2).await.unwrap();
        let job = ArchiveQueue::get(&results, result.id).await.unwrap().unwrap();
        assert_eq!(job.status, ArchiveJobStatus::Pending);
        assert_eq!(job.attempts, 1);

        results.record_failure(result.id, "disk full", 2).await.unwrap();
        let job = ArchiveQueue::get(&results, result.id).await.unwrap().unwrap();
        assert_eq!(job.status, ArchiveJobStatus::Failed);
        assert_eq!(job.last_error.as_deref(), Some("disk full"));
    }
}
