//! Domain errors for the assessment and roster-sync engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors surfaced by services and adapters.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Test not found: {0}")]
    TestNotFound(String),

    #[error("Result not found: {0}")]
    ResultNotFound(Uuid),

    #[error("ERP config not found: {0}")]
    ErpConfigNotFound(Uuid),

    #[error("Employee not found: {external_id} (config {config_id})")]
    EmployeeNotFound { config_id: Uuid, external_id: String },

    #[error("Invitation not found: {0}")]
    InvitationNotFound(Uuid),

    #[error("Session {session_id} is {status}, not accepting writes")]
    SessionClosed { session_id: Uuid, status: String },

    #[error("Question {question_id} does not belong to the test of session {session_id}")]
    QuestionMismatch { session_id: Uuid, question_id: String },

    #[error("Session {session_id} has {answered}/{required} required answers")]
    IncompleteSession { session_id: Uuid, answered: usize, required: usize },

    #[error("Sync already running for config {0}")]
    SyncInProgress(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("ERP authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Primary/archive mismatch: {0}")]
    IntegrityMismatch(String),

    #[error("Invalid invitation token")]
    InvalidToken,

    #[error("Invitation token expired")]
    TokenExpired,

    #[error("Invitation token already used")]
    TokenAlreadyUsed,

    #[error("Archive I/O error: {0}")]
    ArchiveIo(#[from] std::io::Error),

    #[error("Connector error: {0}")]
    ConnectorUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether a background job should retry after this error.
    ///
    /// Transient I/O and connector failures are retried with backoff;
    /// everything else is surfaced or parked for operator review.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ArchiveIo(_) | Self::ConnectorUnavailable(_))
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
