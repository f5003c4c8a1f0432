//! Session lifecycle service: attempt start, answer intake, completion,
//! and the expiry sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Answer, SessionStatus, TestDefinition, TestResult, TestSession};
use crate::domain::ports::{ResultRepository, SessionRepository, TestCatalog};
use crate::services::result_computer::ResultComputer;

/// Owns the test-attempt state machine and answer intake.
///
/// Completion computes the result and commits it atomically with the
/// session's status flip through [`ResultRepository::commit_completion`];
/// a completed session therefore always has exactly one result.
pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
    results: Arc<dyn ResultRepository>,
    catalog: Arc<dyn TestCatalog>,
    computer: ResultComputer,
    session_ttl: Duration,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        results: Arc<dyn ResultRepository>,
        catalog: Arc<dyn TestCatalog>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            sessions,
            results,
            catalog,
            computer: ResultComputer::new(),
            session_ttl,
        }
    }

    /// Start a new attempt at `test_id` for `user_id`.
    #[instrument(skip(self), err)]
    pub async fn start(&self, test_id: &str, user_id: Uuid) -> DomainResult<TestSession> {
        let test = self.require_test(test_id).await?;

        let session = TestSession::new(
            test.id.clone(),
            user_id,
            test.total_questions(),
            self.session_ttl,
        );
        self.sessions.create(&session).await?;

        info!(session_id = %session.id, test_id, "Session started");
        Ok(session)
    }

    /// Record (or overwrite) an answer on an in-progress session.
    #[instrument(skip(self), err)]
    pub async fn record_answer(
        &self,
        session_id: Uuid,
        question_id: &str,
        value: i32,
    ) -> DomainResult<Answer> {
        let session = self.require_session(session_id).await?;
        self.ensure_writable(&session).await?;

        let test = self.require_test(&session.test_id).await?;
        let question =
            test.question(question_id)
                .ok_or_else(|| DomainError::QuestionMismatch {
                    session_id,
                    question_id: question_id.to_string(),
                })?;

        if value < question.scale_min || value > question.scale_max {
            return Err(DomainError::ValidationFailed(format!(
                "answer {value} outside scale {}..={}",
                question.scale_min, question.scale_max
            )));
        }

        let answer = Answer::new(&session, question.id.clone(), value);
        self.sessions.record_answer(&answer, question.ordinal).await?;
        Ok(answer)
    }

    /// Complete a session and commit its result.
    ///
    /// Unless `force` is set, every required question must be answered.
    /// The status flip and the result insert share one transaction; on
    /// any failure the session stays in progress.
    #[instrument(skip(self), err)]
    pub async fn complete(&self, session_id: Uuid, force: bool) -> DomainResult<TestResult> {
        let session = self.require_session(session_id).await?;
        self.ensure_writable(&session).await?;

        let test = self.require_test(&session.test_id).await?;
        let answers = self.sessions.answers(session_id).await?;

        if !force {
            self.ensure_required_answered(&session, &test, &answers)?;
        }

        let result = self.computer.compute(&session, &answers, &test)?;
        self.results.commit_completion(&session, &result).await?;

        info!(
            session_id = %session_id,
            result_id = %result.id,
            overall_score = result.overall_score,
            "Session completed"
        );
        Ok(result)
    }

    /// Maintenance transition to abandoned; completion stays impossible
    /// afterwards.
    #[instrument(skip(self), err)]
    pub async fn abandon(&self, session_id: Uuid) -> DomainResult<()> {
        let moved = self
            .sessions
            .transition(
                session_id,
                &[SessionStatus::Pending, SessionStatus::InProgress],
                SessionStatus::Abandoned,
            )
            .await?;

        if !moved {
            let session = self.require_session(session_id).await?;
            return Err(DomainError::SessionClosed {
                session_id,
                status: session.status.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Idempotent expiry sweep, safe to run concurrently with traffic.
    #[instrument(skip(self), err)]
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let swept = self.sessions.expire_overdue(now).await?;
        if swept > 0 {
            info!(swept, "Expired overdue sessions");
        }
        Ok(swept)
    }

    pub async fn get(&self, session_id: Uuid) -> DomainResult<Option<TestSession>> {
        self.sessions.get(session_id).await
    }

    async fn require_session(&self, session_id: Uuid) -> DomainResult<TestSession> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or(DomainError::SessionNotFound(session_id))
    }

    async fn require_test(&self, test_id: &str) -> DomainResult<TestDefinition> {
        self.catalog
            .get_test(test_id)
            .await?
            .ok_or_else(|| DomainError::TestNotFound(test_id.to_string()))
    }

    /// Reject writes to closed sessions. An overdue session is swept
    /// lazily here rather than waiting for the next maintenance pass.
    async fn ensure_writable(&self, session: &TestSession) -> DomainResult<()> {
        if session.status.is_writable() && session.is_overdue(Utc::now()) {
            warn!(session_id = %session.id, "Session past expiry, sweeping before reject");
            self.sessions
                .transition(
                    session.id,
                    &[SessionStatus::Pending, SessionStatus::InProgress],
                    SessionStatus::Expired,
                )
                .await?;
            return Err(DomainError::SessionClosed {
                session_id: session.id,
                status: SessionStatus::Expired.as_str().to_string(),
            });
        }

        if !session.status.is_writable() {
            return Err(DomainError::SessionClosed {
                session_id: session.id,
                status: session.status.as_str().to_string(),
            });
        }
        Ok(())
    }

    fn ensure_required_answered(
        &self,
        session: &TestSession,
        test: &TestDefinition,
        answers: &[Answer],
    ) -> DomainResult<()> {
        let required = test.required_question_ids();
        let answered = required
            .iter()
            .filter(|id| answers.iter().any(|a| a.question_id == **id))
            .count();

        if answered < required.len() {
            return Err(DomainError::IncompleteSession {
                session_id: session.id,
                answered,
                required: required.len(),
            });
        }
        Ok(())
    }
}
