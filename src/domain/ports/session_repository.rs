//! Session repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Answer, SessionStatus, TestSession};

/// Persistence contract for test sessions and their answers.
///
/// All mutations are transactional and scoped to a single session; the
/// completion path lives on [`ResultRepository`] because it spans the
/// session, the result, and the archive outbox in one transaction.
///
/// [`ResultRepository`]: super::ResultRepository
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &TestSession) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<TestSession>>;

    async fn list_for_user(&self, user_id: Uuid) -> DomainResult<Vec<TestSession>>;

    /// Upsert an answer by (session, question) and advance the
    /// session's `current_question` to `ordinal` when that exceeds the
    /// stored value, in one transaction. Resubmission updates the
    /// existing row, never duplicates it.
    async fn record_answer(&self, answer: &Answer, ordinal: u32) -> DomainResult<()>;

    /// Answers for a session, ordered by question ordinal insertion.
    async fn answers(&self, session_id: Uuid) -> DomainResult<Vec<Answer>>;

    /// Guarded status transition: moves the session to `to` only while
    /// its current status is one of `from`. Returns whether a row
    /// changed, so callers can distinguish lost races from success.
    async fn transition(
        &self,
        id: Uuid,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> DomainResult<bool>;

    /// Idempotent expiry sweep: pending/in-progress sessions with
    /// `expires_at < now` move to expired. Returns the number swept.
    /// Never touches completed sessions.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> DomainResult<u64>;
}
