//! External ERP connector port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ErpConfig, RemoteEmployee};

/// Contract consumed (not implemented) by the sync engine: the external
/// HR system that owns the employee roster.
#[async_trait]
pub trait ErpConnector: Send + Sync {
    /// Authenticate against the remote system. `AuthenticationFailed`
    /// is terminal for a sync run; transport failures surface as
    /// `ConnectorUnavailable` and are retryable.
    async fn authenticate(&self, login: &str, password: &str) -> DomainResult<()>;

    /// Retrieve the employee roster.
    async fn list_employees(&self) -> DomainResult<Vec<RemoteEmployee>>;
}

/// Builds a connector for a config, selecting by its `provider` field.
pub trait ErpConnectorFactory: Send + Sync {
    fn create(&self, config: &ErpConfig) -> DomainResult<Box<dyn ErpConnector>>;
}
