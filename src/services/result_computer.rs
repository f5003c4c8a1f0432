//! Turns a completed session's answers into a scored result.
//!
//! Pure computation: no I/O, no clock beyond the session's own
//! timestamps. Persistence happens in the completion transaction owned
//! by the session service.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Answer, ResultMetadata, TestDefinition, TestResult, TestSession};

/// Computes dimension and overall scores from raw answers.
#[derive(Debug, Default, Clone)]
pub struct ResultComputer;

impl ResultComputer {
    pub fn new() -> Self {
        Self
    }

    /// Score a session.
    ///
    /// Answers are grouped by their question's dimension and normalized
    /// to 0-100 on the question's scale. A dimension with no answers is
    /// omitted entirely: coercing it to 0 would silently drag the
    /// overall score down.
    pub fn compute(
        &self,
        session: &TestSession,
        answers: &[Answer],
        test: &TestDefinition,
    ) -> DomainResult<TestResult> {
        let mut normalized: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut raw_counts: BTreeMap<String, u32> = BTreeMap::new();

        for answer in answers {
            let question = test.question(&answer.question_id).ok_or_else(|| {
                DomainError::QuestionMismatch {
                    session_id: session.id,
                    question_id: answer.question_id.clone(),
                }
            })?;

            let value = normalize(answer.value, question.scale_min, question.scale_max);
            normalized
                .entry(question.dimension.clone())
                .or_default()
                .push(value);
            *raw_counts.entry(question.dimension.clone()).or_default() += 1;
        }

        let dimension_scores: BTreeMap<String, f64> = normalized
            .iter()
            .map(|(dimension, values)| {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                (dimension.clone(), mean)
            })
            .collect();

        let overall_score = weighted_overall(&dimension_scores, test);

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - session.started_at)
            .num_seconds()
            .clamp(0, i64::from(u32::MAX)) as u32;

        Ok(TestResult {
            id: Uuid::new_v4(),
            session_id: session.id,
            user_id: session.user_id,
            test_id: session.test_id.clone(),
            overall_score,
            dimension_scores,
            duration_seconds,
            completed_at,
            metadata: ResultMetadata {
                total_questions: test.total_questions(),
                total_answers: answers.len() as u32,
                raw_counts,
            },
        })
    }
}

/// Normalize a raw value on `[min,max]` to 0-100, clamped.
fn normalize(value: i32, min: i32, max: i32) -> f64 {
    if max <= min {
        return 0.0;
    }
    let span = f64::from(max - min);
    let scaled = f64::from(value - min) / span * 100.0;
    scaled.clamp(0.0, 100.0)
}

/// Weighted mean of the present dimensions, rounded half-up to 0-100.
fn weighted_overall(dimension_scores: &BTreeMap<String, f64>, test: &TestDefinition) -> u8 {
    if dimension_scores.is_empty() {
        return 0;
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (dimension, score) in dimension_scores {
        let weight = test.weight_for(dimension);
        weighted_sum += score * weight;
        weight_total += weight;
    }

    if weight_total == 0.0 {
        return 0;
    }

    (weighted_sum / weight_total).round().clamp(0.0, 100.0) as u8
}
