//! Archive mirror models: immutable records, the per-user pointer
//! index, and the outbox row driving asynchronous archival.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::{ResultMetadata, TestResult};

/// Current archive record schema version.
pub const ARCHIVE_SCHEMA_VERSION: u32 = 1;

/// Immutable file-archive mirror of a [`TestResult`], denormalized with
/// the test and user descriptors the read path needs without joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedResultRecord {
    pub schema_version: u32,
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub test_id: String,
    pub test_name: String,
    pub test_type: String,
    pub user_email: String,
    pub overall_score: u8,
    pub dimension_scores: BTreeMap<String, f64>,
    pub duration_seconds: u32,
    pub completed_at: DateTime<Utc>,
    pub metadata: ResultMetadata,
    pub archived_at: DateTime<Utc>,
    /// Path relative to the archive root, fixed at write time.
    pub file_path: String,
}

impl ArchivedResultRecord {
    /// Build the record for a result, stamping the deterministic
    /// archive path `{year}/{month}/{test_type}/{result_id}.json`.
    pub fn from_result(result: &TestResult, descriptor: &ResultDescriptor) -> Self {
        let file_path = Self::relative_path(result, &descriptor.test_type);
        Self {
            schema_version: ARCHIVE_SCHEMA_VERSION,
            id: result.id,
            session_id: result.session_id,
            user_id: result.user_id,
            test_id: result.test_id.clone(),
            test_name: descriptor.test_name.clone(),
            test_type: descriptor.test_type.clone(),
            user_email: descriptor.user_email.clone(),
            overall_score: result.overall_score,
            dimension_scores: result.dimension_scores.clone(),
            duration_seconds: result.duration_seconds,
            completed_at: result.completed_at,
            metadata: result.metadata.clone(),
            archived_at: Utc::now(),
            file_path,
        }
    }

    /// The deterministic archive path for a result, keyed on its
    /// completion date so re-archiving lands on the same file.
    pub fn relative_path(result: &TestResult, test_type: &str) -> String {
        format!(
            "{:04}/{:02}/{}/{}.json",
            result.completed_at.year(),
            result.completed_at.month(),
            test_type,
            result.id
        )
    }
}

/// Denormalized test/user descriptors carried into the archive so a
/// record is readable without the primary store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultDescriptor {
    pub test_name: String,
    pub test_type: String,
    pub user_email: String,
}

/// Pointer into the archive, one per record, kept per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveIndexEntry {
    pub id: Uuid,
    pub file_path: String,
    pub completed_at: DateTime<Utc>,
}

/// Status of an archive outbox job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveJobStatus {
    /// Awaiting (or retrying) the archive write
    Pending,
    /// Record written and indexed
    Done,
    /// Gave up after max attempts; parked for operator review
    Failed,
}

impl ArchiveJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Outbox row created transactionally with every result commit and
/// consumed asynchronously by the archiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveJob {
    pub result_id: Uuid,
    pub status: ArchiveJobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn relative_path_is_stable_for_a_result() {
        let result = TestResult {
            id: Uuid::nil(),
            session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            test_id: "big5".into(),
            overall_score: 65,
            dimension_scores: BTreeMap::new(),
            duration_seconds: 600,
            completed_at: Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap(),
            metadata: ResultMetadata::default(),
        };
        assert_eq!(
            ArchivedResultRecord::relative_path(&result, "personality"),
            "2026/03/personality/00000000-0000-0000-0000-000000000000.json"
        );
    }
}
