//! Service layer: business logic over the domain ports.

pub mod archiver;
pub mod erp_sync;
pub mod invitation_service;
pub mod maintenance_daemon;
pub mod reconciliation;
pub mod result_computer;
pub mod session_service;

pub use archiver::{ArchiveReport, Archiver};
pub use erp_sync::ErpSyncEngine;
pub use invitation_service::{BulkInviteReport, InvitationService};
pub use maintenance_daemon::{
    DaemonHandle, DaemonStatus, MaintenanceDaemon, MaintenanceEvent, MaintenanceReport, StopReason,
};
pub use reconciliation::{ReconciledResult, ReconciliationReader, ResultSource, ResultStatistics};
pub use result_computer::ResultComputer;
pub use session_service::SessionService;
