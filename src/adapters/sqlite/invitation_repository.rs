//! SQLite implementation of the InvitationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Invitation, InvitationStatus};
use crate::domain::ports::InvitationRepository;

use super::row::{parse_opt_ts, parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteInvitationRepository {
    pool: SqlitePool,
}

impl SqliteInvitationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvitationRepository for SqliteInvitationRepository {
    async fn create(&self, invitation: &Invitation) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO invitations (id, token, company_id, test_id, email, erp_config_id,
               employee_external_id, status, expires_at, accepted_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(invitation.id.to_string())
        .bind(&invitation.token)
        .bind(invitation.company_id.to_string())
        .bind(&invitation.test_id)
        .bind(&invitation.email)
        .bind(invitation.erp_config_id.map(|id| id.to_string()))
        .bind(&invitation.employee_external_id)
        .bind(invitation.status.as_str())
        .bind(invitation.expires_at.to_rfc3339())
        .bind(invitation.accepted_at.map(|t| t.to_rfc3339()))
        .bind(invitation.created_at.to_rfc3339())
        .bind(invitation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Invitation>> {
        let row: Option<InvitationRow> = sqlx::query_as("SELECT * FROM invitations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_token(&self, token: &str) -> DomainResult<Option<Invitation>> {
        let row: Option<InvitationRow> =
            sqlx::query_as("SELECT * FROM invitations WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_live(&self, email: &str, test_id: &str) -> DomainResult<Option<Invitation>> {
        let row: Option<InvitationRow> = sqlx::query_as(
            r#"SELECT * FROM invitations
               WHERE email = ? AND test_id = ? AND status IN ('pending', 'sent')
               ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(email)
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn mark_sent(&self, ids: &[Uuid]) -> DomainResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let query = format!(
            "UPDATE invitations SET status = 'sent', updated_at = ?
             WHERE status = 'pending' AND id IN ({placeholders})"
        );

        let mut q = sqlx::query(&query).bind(Utc::now().to_rfc3339());
        for id in ids {
            q = q.bind(id.to_string());
        }

        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: &[InvitationStatus],
        to: InvitationStatus,
        accepted_at: Option<DateTime<Utc>>,
    ) -> DomainResult<bool> {
        if from.is_empty() {
            return Err(DomainError::ValidationFailed(
                "transition requires at least one source status".to_string(),
            ));
        }

        let placeholders = vec!["?"; from.len()].join(", ");
        let query = format!(
            "UPDATE invitations
             SET status = ?, accepted_at = COALESCE(?, accepted_at), updated_at = ?
             WHERE id = ? AND status IN ({placeholders})"
        );

        let mut q = sqlx::query(&query)
            .bind(to.as_str())
            .bind(accepted_at.map(|t| t.to_rfc3339()))
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string());
        for status in from {
            q = q.bind(status.as_str());
        }

        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let result = sqlx::query(
            r#"UPDATE invitations SET status = 'expired', updated_at = ?
               WHERE status IN ('pending', 'sent') AND expires_at < ?"#,
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_for_company(&self, company_id: Uuid) -> DomainResult<Vec<Invitation>> {
        let rows: Vec<InvitationRow> =
            sqlx::query_as("SELECT * FROM invitations WHERE company_id = ? ORDER BY created_at DESC")
                .bind(company_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct InvitationRow {
    id: String,
    token: String,
    company_id: String,
    test_id: String,
    email: String,
    erp_config_id: Option<String>,
    employee_external_id: Option<String>,
    status: String,
    expires_at: String,
    accepted_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = DomainError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        let status = InvitationStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid invitation status: {}", row.status))
        })?;

        let erp_config_id = row
            .erp_config_id
            .as_deref()
            .map(parse_uuid)
            .transpose()?;

        Ok(Invitation {
            id: parse_uuid(&row.id)?,
            token: row.token,
            company_id: parse_uuid(&row.company_id)?,
            test_id: row.test_id,
            email: row.email,
            erp_config_id,
            employee_external_id: row.employee_external_id,
            status,
            expires_at: parse_ts(&row.expires_at)?,
            accepted_at: parse_opt_ts(row.accepted_at.as_deref())?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{all_embedded_migrations, create_test_pool, Migrator};
    use chrono::Duration;

    async fn setup_test_repo() -> SqliteInvitationRepository {
        let pool = create_test_pool().await.unwrap();
        let migrator = Migrator::new(pool.clone());
        migrator
            .run_embedded_migrations(all_embedded_migrations())
            .await
            .unwrap();
        SqliteInvitationRepository::new(pool)
    }

    #[tokio::test]
    async fn test_find_live_ignores_terminal_invitations() {
        let repo = setup_test_repo().await;
        let company = Uuid::new_v4();

        let mut cancelled =
            Invitation::new(company, "big5".into(), "a@x.com".into(), Duration::days(7));
        cancelled.status = InvitationStatus::Cancelled;
        repo.create(&cancelled).await.unwrap();

        assert!(repo.find_live("a@x.com", "big5").await.unwrap().is_none());

        let live = Invitation::new(company, "big5".into(), "a@x.com".into(), Duration::days(7));
        repo.create(&live).await.unwrap();

        let found = repo.find_live("a@x.com", "big5").await.unwrap().unwrap();
        assert_eq!(found.id, live.id);
    }

    #[tokio::test]
    async fn test_guarded_transition_rejects_terminal_source() {
        let repo = setup_test_repo().await;
        let invitation = Invitation::new(
            Uuid::new_v4(),
            "big5".into(),
            "a@x.com".into(),
            Duration::days(7),
        );
        repo.create(&invitation).await.unwrap();

        let accepted = repo
            .transition(
                invitation.id,
                &[InvitationStatus::Pending, InvitationStatus::Sent],
                InvitationStatus::Accepted,
                Some(Utc::now()),
            )
            .await
            .unwrap();
        assert!(accepted);

        // Accepted is terminal; a second accept changes nothing.
        let again = repo
            .transition(
                invitation.id,
                &[InvitationStatus::Pending, InvitationStatus::Sent],
                InvitationStatus::Accepted,
                Some(Utc::now()),
            )
            .await
            .unwrap();
        assert!(!again);
    }
}
