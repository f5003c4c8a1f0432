//! Scored test result domain model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit trail captured alongside every result so a score can be
/// recomputed or explained later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub total_questions: u32,
    pub total_answers: u32,
    /// Raw answer count per dimension, including dimensions that ended
    /// up omitted from the scores.
    pub raw_counts: BTreeMap<String, u32>,
}

/// The authoritative scored outcome of a completed session.
///
/// Exactly one result exists per completed session (`session_id` is
/// unique in the store). Immutable after commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub test_id: String,
    /// Weighted mean over present dimensions, rounded half-up, 0-100.
    pub overall_score: u8,
    /// Dimension name -> score. Dimensions without answers are absent,
    /// never stored as zero.
    pub dimension_scores: BTreeMap<String, f64>,
    pub duration_seconds: u32,
    pub completed_at: DateTime<Utc>,
    pub metadata: ResultMetadata,
}

/// Filters accepted by the reconciled listing.
#[derive(Debug, Clone, Default)]
pub struct ResultFilters {
    pub test_id: Option<String>,
    pub completed_after: Option<DateTime<Utc>>,
    pub completed_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ResultFilters {
    pub fn matches(&self, test_id: &str, completed_at: DateTime<Utc>) -> bool {
        if let Some(ref wanted) = self.test_id {
            if wanted != test_id {
                return false;
            }
        }
        if let Some(after) = self.completed_after {
            if completed_at < after {
                return false;
            }
        }
        if let Some(before) = self.completed_before {
            if completed_at > before {
                return false;
            }
        }
        true
    }
}
