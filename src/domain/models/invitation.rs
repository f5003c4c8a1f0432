//! Invitation domain model.
//!
//! Invitations are derived in bulk from the ERP employee cache and
//! redeemed by token. Provenance back to the spawning employee is kept
//! on the row so deactivating an employee never orphans its history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    /// Created, not yet handed to delivery
    Pending,
    /// Handed to the notification collaborator
    Sent,
    /// Token redeemed; terminal
    Accepted,
    /// Past expiry without redemption; terminal
    Expired,
    /// Withdrawn by an operator; terminal
    Cancelled,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "accepted" => Some(Self::Accepted),
            "expired" => Some(Self::Expired),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// A live invitation blocks re-inviting the same (email, test).
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Sent)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Expired | Self::Cancelled)
    }
}

/// A single invitation to take a test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    /// Unique opaque redemption token.
    pub token: String,
    pub company_id: Uuid,
    pub test_id: String,
    pub email: String,
    /// Provenance: the ERP employee this invitation was derived from.
    pub erp_config_id: Option<Uuid>,
    pub employee_external_id: Option<String>,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    /// Create a pending invitation with a fresh token.
    pub fn new(company_id: Uuid, test_id: String, email: String, validity: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            token: Uuid::new_v4().simple().to_string(),
            company_id,
            test_id,
            email,
            erp_config_id: None,
            employee_external_id: None,
            status: InvitationStatus::Pending,
            expires_at: now + validity,
            accepted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_provenance(mut self, erp_config_id: Uuid, external_id: &str) -> Self {
        self.erp_config_id = Some(erp_config_id);
        self.employee_external_id = Some(external_id.to_string());
        self
    }

    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Context returned on successful redemption, enough for the caller to
/// route the user into the right test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionContext {
    pub invitation_id: Uuid,
    pub company_id: Uuid,
    pub test_id: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_and_sent_are_live() {
        assert!(InvitationStatus::Pending.is_live());
        assert!(InvitationStatus::Sent.is_live());
        assert!(!InvitationStatus::Accepted.is_live());
        assert!(!InvitationStatus::Cancelled.is_live());
    }

    #[test]
    fn tokens_are_unique_per_invitation() {
        let company = Uuid::new_v4();
        let a = Invitation::new(company, "big5".into(), "a@x.com".into(), Duration::days(7));
        let b = Invitation::new(company, "big5".into(), "a@x.com".into(), Duration::days(7));
        assert_ne!(a.token, b.token);
    }
}
