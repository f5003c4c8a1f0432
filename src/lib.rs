//! Appraise - Assessment Result & Roster Engine
//!
//! The result persistence and reconciliation subsystem of a
//! multi-tenant assessment platform, plus the engine that keeps local
//! employee caches in sync with external HR systems.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture
//! principles:
//!
//! - **Domain Layer** (`domain`): Models, ports, and the error taxonomy
//! - **Service Layer** (`services`): Session lifecycle, scoring,
//!   archival, reconciliation, roster sync, and invitations
//! - **Adapters** (`adapters`): SQLite repositories, the file archive,
//!   and the HTTP ERP connector
//! - **Infrastructure** (`infrastructure`): Configuration and logging
//!
//! # Data flow
//!
//! Sessions take answers and complete into a scored result, committed
//! transactionally to the authoritative store together with an archive
//! outbox row. The archiver mirrors each result into the append-only
//! file archive, and the reconciliation reader merges both stores into
//! one deduplicated view at read time. The sync engine runs
//! independently, feeding the employee cache that bulk invitations
//! derive from.

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Answer, ArchiveJobStatus, ArchivedResultRecord, Config, EmployeeStatus, ErpConfig,
    ErpEmployee, ErpSyncLog, Invitation, InvitationStatus, InvitePolicy, RemoteEmployee,
    ResultFilters, SessionStatus, SyncRunStatus, SyncStatus, SyncType, TestDefinition,
    TestResult, TestSession,
};
pub use domain::ports::{
    ArchiveQueue, ArchiveStore, ErpConfigRepository, ErpConnector, ErpConnectorFactory,
    ErpEmployeeRepository, ErpSyncLogRepository, InvitationRepository, ResultRepository,
    SessionRepository, TestCatalog, UserDirectory,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    Archiver, ErpSyncEngine, InvitationService, MaintenanceDaemon, ReconciliationReader,
    ResultComputer, SessionService,
};
