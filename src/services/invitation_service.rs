//! Bulk invitation derivation and token redemption.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    EmployeeStatus, Invitation, InvitationStatus, InvitePolicy, RedemptionContext,
};
use crate::domain::ports::{ErpConfigRepository, ErpEmployeeRepository, InvitationRepository};

/// Outcome of a bulk derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkInviteReport {
    /// Invitations created (and batch-marked sent).
    pub created: Vec<Uuid>,
    /// Employees skipped because a live invitation already exists.
    pub skipped_existing: u32,
    /// Employees skipped because they are inactive or unknown.
    pub skipped_inactive: u32,
}

/// Derives invitations from the employee cache and redeems tokens.
///
/// The set of invitable tests is an injected [`InvitePolicy`], not a
/// hardcoded list, so deployments and tests supply their own.
pub struct InvitationService {
    invitations: Arc<dyn InvitationRepository>,
    employees: Arc<dyn ErpEmployeeRepository>,
    configs: Arc<dyn ErpConfigRepository>,
    policy: InvitePolicy,
    validity: Duration,
}

impl InvitationService {
    pub fn new(
        invitations: Arc<dyn InvitationRepository>,
        employees: Arc<dyn ErpEmployeeRepository>,
        configs: Arc<dyn ErpConfigRepository>,
        policy: InvitePolicy,
        validity: Duration,
    ) -> Self {
        Self {
            invitations,
            employees,
            configs,
            policy,
            validity,
        }
    }

    /// Create one invitation per selected active employee that lacks a
    /// live invitation for `test_id`, then batch-mark the new batch
    /// sent.
    ///
    /// Idempotent per employee: re-running the same selection skips
    /// everyone already holding a live invitation.
    #[instrument(skip(self, external_ids), fields(count = external_ids.len()), err)]
    pub async fn bulk_invite(
        &self,
        config_id: Uuid,
        external_ids: &[String],
        test_id: &str,
    ) -> DomainResult<BulkInviteReport> {
        if !self.policy.permits(test_id) {
            return Err(DomainError::ValidationFailed(format!(
                "test '{test_id}' is not open for invitations"
            )));
        }

        let config = self
            .configs
            .get(config_id)
            .await?
            .ok_or(DomainError::ErpConfigNotFound(config_id))?;

        let mut report = BulkInviteReport::default();

        for external_id in external_ids {
            let employee = match self.employees.get(config_id, external_id).await? {
                Some(e) if e.status == EmployeeStatus::Active && !e.email.is_empty() => e,
                Some(_) | None => {
                    report.skipped_inactive += 1;
                    continue;
                }
            };

            if self
                .invitations
                .find_live(&employee.email, test_id)
                .await?
                .is_some()
            {
                report.skipped_existing += 1;
                continue;
            }

            let invitation = Invitation::new(
                config.company_id,
                test_id.to_string(),
                employee.email.clone(),
                self.validity,
            )
            .with_provenance(config_id, external_id);

            self.invitations.create(&invitation).await?;
            report.created.push(invitation.id);
        }

        let sent = self.invitations.mark_sent(&report.created).await?;
        info!(
            config_id = %config_id,
            test_id,
            created = report.created.len(),
            sent,
            skipped_existing = report.skipped_existing,
            skipped_inactive = report.skipped_inactive,
            "Bulk invitation pass finished"
        );

        Ok(report)
    }

    /// Redeem a token.
    ///
    /// Accepted is terminal: the first call wins, every later call
    /// fails with `TokenAlreadyUsed`. An overdue token is flipped to
    /// expired on the spot.
    #[instrument(skip(self, token), err)]
    pub async fn redeem(&self, token: &str) -> DomainResult<RedemptionContext> {
        let invitation = self
            .invitations
            .get_by_token(token)
            .await?
            .ok_or(DomainError::InvalidToken)?;

        match invitation.status {
            InvitationStatus::Accepted => return Err(DomainError::TokenAlreadyUsed),
            InvitationStatus::Cancelled | InvitationStatus::Expired => {
                return Err(DomainError::InvalidToken)
            }
            InvitationStatus::Pending | InvitationStatus::Sent => {}
        }

        let now = Utc::now();
        if invitation.is_past_expiry(now) {
            self.invitations
                .transition(
                    invitation.id,
                    &[InvitationStatus::Pending, InvitationStatus::Sent],
                    InvitationStatus::Expired,
                    None,
                )
                .await?;
            return Err(DomainError::TokenExpired);
        }

        // The guarded transition settles a race between two redeemers:
        // exactly one of them flips the row.
        let accepted = self
            .invitations
            .transition(
                invitation.id,
                &[InvitationStatus::Pending, InvitationStatus::Sent],
                InvitationStatus::Accepted,
                Some(now),
            )
            .await?;

        if !accepted {
            return Err(DomainError::TokenAlreadyUsed);
        }

        info!(invitation_id = %invitation.id, "Invitation redeemed");
        Ok(RedemptionContext {
            invitation_id: invitation.id,
            company_id: invitation.company_id,
            test_id: invitation.test_id,
            email: invitation.email,
        })
    }

    /// Withdraw a live invitation.
    #[instrument(skip(self), err)]
    pub async fn cancel(&self, invitation_id: Uuid) -> DomainResult<()> {
        let cancelled = self
            .invitations
            .transition(
                invitation_id,
                &[InvitationStatus::Pending, InvitationStatus::Sent],
                InvitationStatus::Cancelled,
                None,
            )
            .await?;

        if !cancelled {
            let invitation = self
                .invitations
                .get(invitation_id)
                .await?
                .ok_or(DomainError::InvitationNotFound(invitation_id))?;
            warn!(invitation_id = %invitation_id, status = invitation.status.as_str(),
                "Cancel rejected: invitation already terminal");
            return Err(DomainError::InvalidStateTransition {
                from: invitation.status.as_str().to_string(),
                to: InvitationStatus::Cancelled.as_str().to_string(),
                reason: "invitation already terminal".to_string(),
            });
        }
        Ok(())
    }

    /// Idempotent sweep flipping overdue live invitations to expired.
    #[instrument(skip(self), err)]
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let swept = self.invitations.expire_overdue(now).await?;
        if swept > 0 {
            info!(swept, "Expired overdue invitations");
        }
        Ok(swept)
    }
}
