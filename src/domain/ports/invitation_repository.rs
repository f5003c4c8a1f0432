//! Invitation repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Invitation, InvitationStatus};

/// Persistence contract for invitations.
#[async_trait]
pub trait InvitationRepository: Send + Sync {
    async fn create(&self, invitation: &Invitation) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Invitation>>;

    async fn get_by_token(&self, token: &str) -> DomainResult<Option<Invitation>>;

    /// A live (pending/sent) invitation for this (email, test), if any.
    /// Drives the never-double-invite guarantee.
    async fn find_live(&self, email: &str, test_id: &str) -> DomainResult<Option<Invitation>>;

    /// Batch transition pending invitations to sent.
    async fn mark_sent(&self, ids: &[Uuid]) -> DomainResult<u64>;

    /// Guarded transition to `to` while the status is one of `from`.
    /// Returns whether a row changed.
    async fn transition(
        &self,
        id: Uuid,
        from: &[InvitationStatus],
        to: InvitationStatus,
        accepted_at: Option<DateTime<Utc>>,
    ) -> DomainResult<bool>;

    /// Idempotent sweep: live invitations past `expires_at` move to
    /// expired. Returns the number swept.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> DomainResult<u64>;

    async fn list_for_company(&self, company_id: Uuid) -> DomainResult<Vec<Invitation>>;
}
