//! Result repository port, including the completion transaction and
//! the archive outbox.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ArchiveJob, ResultFilters, TestResult, TestSession};

/// Persistence contract for authoritative results.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Commit a session's completion atomically: flip the session to
    /// completed (guarded on it still being in progress), insert the
    /// result, and append the archive outbox row in one transaction.
    ///
    /// Fails with `SessionClosed` when the guard matches no row, which
    /// also aborts the result insert: a completed session without a
    /// result cannot be produced, nor the reverse.
    async fn commit_completion(&self, session: &TestSession, result: &TestResult)
        -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<TestResult>>;

    async fn get_by_session(&self, session_id: Uuid) -> DomainResult<Option<TestResult>>;

    /// Authoritative results for a user, filtered, newest first.
    async fn list_for_user(&self, user_id: Uuid, filters: &ResultFilters)
        -> DomainResult<Vec<TestResult>>;
}

/// Archive outbox contract consumed by the archiver.
#[async_trait]
pub trait ArchiveQueue: Send + Sync {
    /// Pending jobs, oldest first.
    async fn pending(&self, limit: u32) -> DomainResult<Vec<ArchiveJob>>;

    async fn mark_done(&self, result_id: Uuid) -> DomainResult<()>;

    /// Record a failed attempt. The job stays pending until `attempts`
    /// reaches `max_attempts`, then parks as failed.
    async fn record_failure(
        &self,
        result_id: Uuid,
        error: &str,
        max_attempts: u32,
    ) -> DomainResult<()>;

    async fn get(&self, result_id: Uuid) -> DomainResult<Option<ArchiveJob>>;
}
