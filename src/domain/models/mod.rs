pub mod archive;
pub mod catalog;
pub mod config;
pub mod erp;
pub mod invitation;
pub mod result;
pub mod session;

pub use archive::{
    ArchiveIndexEntry, ArchiveJob, ArchiveJobStatus, ArchivedResultRecord, ResultDescriptor,
    ARCHIVE_SCHEMA_VERSION,
};
pub use catalog::{QuestionDefinition, TestDefinition};
pub use config::{
    ArchiveConfig, Config, DatabaseConfig, InvitationConfig, InvitePolicy, LoggingConfig,
    MaintenanceConfig, SessionConfig, SyncConfig,
};
pub use erp::{
    EmployeeStatus, ErpConfig, ErpEmployee, ErpSyncLog, RemoteEmployee, SyncReport, SyncRunStatus,
    SyncStatus, SyncType,
};
pub use invitation::{Invitation, InvitationStatus, RedemptionContext};
pub use result::{ResultFilters, ResultMetadata, TestResult};
pub use session::{Answer, SessionStatus, TestSession};
