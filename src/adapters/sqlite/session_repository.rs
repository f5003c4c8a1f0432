//! SQLite implementation of the SessionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Answer, SessionStatus, TestSession};
use crate::domain::ports::SessionRepository;

use super::row::{parse_opt_ts, parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create(&self, session: &TestSession) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO test_sessions (id, test_id, user_id, status, current_question,
               total_questions, time_spent_seconds, started_at, completed_at, expires_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(session.id.to_string())
        .bind(&session.test_id)
        .bind(session.user_id.to_string())
        .bind(session.status.as_str())
        .bind(session.current_question as i64)
        .bind(session.total_questions as i64)
        .bind(session.time_spent_seconds as i64)
        .bind(session.started_at.to_rfc3339())
        .bind(session.completed_at.map(|t| t.to_rfc3339()))
        .bind(session.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<TestSession>> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM test_sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> DomainResult<Vec<TestSession>> {
        let rows: Vec<SessionRow> =
            sqlx::query_as("SELECT * FROM test_sessions WHERE user_id = ? ORDER BY started_at DESC")
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn record_answer(&self, answer: &Answer, ordinal: u32) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO answers (id, session_id, question_id, user_id, value,
               time_spent_seconds, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(session_id, question_id)
               DO UPDATE SET value = excluded.value,
                             time_spent_seconds = excluded.time_spent_seconds,
                             updated_at = excluded.updated_at"#,
        )
        .bind(answer.id.to_string())
        .bind(answer.session_id.to_string())
        .bind(&answer.question_id)
        .bind(answer.user_id.to_string())
        .bind(i64::from(answer.value))
        .bind(answer.time_spent_seconds as i64)
        .bind(answer.created_at.to_rfc3339())
        .bind(answer.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        // First answer moves a pending session in progress;
        // current_question only ever advances.
        sqlx::query(
            r#"UPDATE test_sessions
               SET status = CASE WHEN status = 'pending' THEN 'in_progress' ELSE status END,
                   current_question = MAX(current_question, ?)
               WHERE id = ?"#,
        )
        .bind(ordinal as i64)
        .bind(answer.session_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn answers(&self, session_id: Uuid) -> DomainResult<Vec<Answer>> {
        let rows: Vec<AnswerRow> =
            sqlx::query_as("SELECT * FROM answers WHERE session_id = ? ORDER BY created_at")
                .bind(session_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn transition(
        &self,
        id: Uuid,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> DomainResult<bool> {
        if from.is_empty() {
            return Err(DomainError::ValidationFailed(
                "transition requires at least one source status".to_string(),
            ));
        }

        let placeholders = vec!["?"; from.len()].join(", ");
        let completed_at = (to == SessionStatus::Completed).then(|| Utc::now().to_rfc3339());

        let query = format!(
            "UPDATE test_sessions SET status = ?, completed_at = COALESCE(?, completed_at)
             WHERE id = ? AND status IN ({placeholders})"
        );

        let mut q = sqlx::query(&query)
            .bind(to.as_str())
            .bind(completed_at)
            .bind(id.to_string());
        for status in from {
            q = q.bind(status.as_str());
        }

        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let result = sqlx::query(
            r#"UPDATE test_sessions SET status = 'expired'
               WHERE status IN ('pending', 'in_progress') AND expires_at < ?"#,
        )
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    test_id: String,
    user_id: String,
    status: String,
    current_question: i64,
    total_questions: i64,
    time_spent_seconds: i64,
    started_at: String,
    completed_at: Option<String>,
    expires_at: String,
}

impl TryFrom<SessionRow> for TestSession {
    type Error = DomainError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status = SessionStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;

        Ok(TestSession {
            id: parse_uuid(&row.id)?,
            test_id: row.test_id,
            user_id: parse_uuid(&row.user_id)?,
            status,
            current_question: row.current_question as u32,
            total_questions: row.total_questions as u32,
            time_spent_seconds: row.time_spent_seconds as u32,
            started_at: parse_ts(&row.started_at)?,
            completed_at: parse_opt_ts(row.completed_at.as_deref())?,
            expires_at: parse_ts(&row.expires_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AnswerRow {
    id: String,
    session_id: String,
    question_id: String,
    user_id: String,
    value: i64,
    time_spent_seconds: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AnswerRow> for Answer {
    type Error = DomainError;

    fn try_from(row: AnswerRow) -> Result<Self, Self::Error> {
        Ok(Answer {
            id: parse_uuid(&row.id)?,
            session_id: parse_uuid(&row.session_id)?,
            question_id: row.question_id,
            user_id: parse_uuid(&row.user_id)?,
            value: row.value as i32,
            time_spent_seconds: row.time_spent_seconds as u32,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}
