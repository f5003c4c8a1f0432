//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that infrastructure adapters implement:
//! - `SessionRepository` / `ResultRepository` / `ArchiveQueue`: the
//!   authoritative SQLite store
//! - `ArchiveStore`: the append-only file mirror and its per-user index
//! - `ErpConfigRepository` / `ErpEmployeeRepository` /
//!   `ErpSyncLogRepository`: roster sync state
//! - `InvitationRepository`: derived invitations
//! - `ErpConnector`: the external HR system (consumed, not implemented)
//! - `TestCatalog` / `UserDirectory`: collaborator reads
//!
//! These contracts keep the domain independent of specific
//! infrastructure implementations.

pub mod archive_store;
pub mod catalog;
pub mod erp_connector;
pub mod erp_repository;
pub mod invitation_repository;
pub mod result_repository;
pub mod session_repository;

pub use archive_store::ArchiveStore;
pub use catalog::{TestCatalog, UserDirectory};
pub use erp_connector::{ErpConnector, ErpConnectorFactory};
pub use erp_repository::{ErpConfigRepository, ErpEmployeeRepository, ErpSyncLogRepository};
pub use invitation_repository::InvitationRepository;
pub use result_repository::{ArchiveQueue, ResultRepository};
pub use session_repository::SessionRepository;
