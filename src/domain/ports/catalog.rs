//! Collaborator ports: test catalog and user directory.
//!
//! Question content and identity live outside this subsystem; these
//! ports are how it reads them.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::TestDefinition;

/// Read access to test definitions (questions, dimensions, weights).
#[async_trait]
pub trait TestCatalog: Send + Sync {
    async fn get_test(&self, test_id: &str) -> DomainResult<Option<TestDefinition>>;
}

/// Read access to user contact data, for the denormalized descriptors
/// carried into the archive.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// The user's email, or empty when unknown (archival proceeds
    /// regardless; the descriptor is best-effort denormalization).
    async fn email_for(&self, user_id: Uuid) -> DomainResult<String>;
}
