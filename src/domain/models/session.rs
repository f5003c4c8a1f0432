//! Test session domain model.
//!
//! A session is one user's attempt at a test. It owns the answer intake
//! and moves through a small state machine until it reaches a terminal
//! state via completion, time-based expiry, or maintenance abandonment.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a test session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session created but no answer recorded yet
    Pending,
    /// User is actively answering
    InProgress,
    /// All done; a result exists for this session
    Completed,
    /// TTL elapsed before completion
    Expired,
    /// Closed by maintenance without completion
    Abandoned,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Abandoned => "abandoned",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Abandoned)
    }

    /// Whether the session still accepts answer writes.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<SessionStatus> {
        match self {
            Self::Pending => vec![Self::InProgress, Self::Expired, Self::Abandoned],
            Self::InProgress => vec![Self::Completed, Self::Expired, Self::Abandoned],
            Self::Completed => vec![],
            Self::Expired => vec![],
            Self::Abandoned => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// One user's attempt at a test.
///
/// Invariants: `completed_at` is set iff status is [`SessionStatus::Completed`];
/// `current_question` never decreases while the session is writable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSession {
    pub id: Uuid,
    pub test_id: String,
    pub user_id: Uuid,
    pub status: SessionStatus,
    /// Highest question ordinal answered so far.
    pub current_question: u32,
    pub total_questions: u32,
    pub time_spent_seconds: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl TestSession {
    /// Create a fresh in-progress session expiring after `ttl`.
    pub fn new(test_id: String, user_id: Uuid, total_questions: u32, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            test_id,
            user_id,
            status: SessionStatus::InProgress,
            current_question: 0,
            total_questions,
            time_spent_seconds: 0,
            started_at: now,
            completed_at: None,
            expires_at: now + ttl,
        }
    }

    /// Whether the TTL has elapsed at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// A single recorded answer.
///
/// At most one answer exists per (session, question); resubmission
/// updates the row in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_id: String,
    pub user_id: Uuid,
    pub value: i32,
    pub time_spent_seconds: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Answer {
    pub fn new(session: &TestSession, question_id: String, value: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id: session.id,
            question_id,
            user_id: session.user_id,
            value,
            time_spent_seconds: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_accept_no_transitions() {
        for status in [SessionStatus::Completed, SessionStatus::Expired, SessionStatus::Abandoned] {
            assert!(status.is_terminal());
            assert!(status.valid_transitions().is_empty());
        }
    }

    #[test]
    fn in_progress_can_complete_or_expire() {
        assert!(SessionStatus::InProgress.can_transition_to(SessionStatus::Completed));
        assert!(SessionStatus::InProgress.can_transition_to(SessionStatus::Expired));
        assert!(!SessionStatus::Completed.can_transition_to(SessionStatus::Expired));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            SessionStatus::Pending,
            SessionStatus::InProgress,
            SessionStatus::Completed,
            SessionStatus::Expired,
            SessionStatus::Abandoned,
        ] {
            assert_eq!(SessionStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn new_session_is_writable_and_not_overdue() {
        let session = TestSession::new("big5".into(), Uuid::new_v4(), 10, Duration::hours(2));
        assert!(session.status.is_writable());
        assert!(!session.is_overdue(Utc::now()));
        assert!(session.completed_at.is_none());
    }
}
