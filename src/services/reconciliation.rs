//! Read-path merger of authoritative and archived results.
//!
//! The archive is a mirror, not an independent source: any id present
//! in the authoritative store wins, and archived duplicates are
//! dropped before anything is counted. Aggregates are computed on the
//! deduplicated view only.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ArchivedResultRecord, ResultFilters, TestResult};
use crate::domain::ports::{ArchiveStore, ResultRepository, TestCatalog};

/// Which store a merged entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Authoritative,
    Archive,
}

/// One deduplicated entry of the merged view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciledResult {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub test_id: String,
    pub test_type: String,
    pub overall_score: u8,
    pub dimension_scores: BTreeMap<String, f64>,
    pub duration_seconds: u32,
    pub completed_at: DateTime<Utc>,
    pub source: ResultSource,
}

/// Aggregates over the deduplicated view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultStatistics {
    pub total: u64,
    pub average_score: Option<f64>,
    pub by_test_type: BTreeMap<String, u64>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Merges both stores into one deduplicated, sorted, aggregated view.
pub struct ReconciliationReader {
    results: Arc<dyn ResultRepository>,
    archive: Arc<dyn ArchiveStore>,
    catalog: Arc<dyn TestCatalog>,
}

impl ReconciliationReader {
    pub fn new(
        results: Arc<dyn ResultRepository>,
        archive: Arc<dyn ArchiveStore>,
        catalog: Arc<dyn TestCatalog>,
    ) -> Self {
        Self {
            results,
            archive,
            catalog,
        }
    }

    /// The user's results across both stores, deduplicated by id with
    /// authoritative priority, newest completion first.
    ///
    /// A result that exists only in the authoritative store is the
    /// normal archive-lag case, not an error.
    #[instrument(skip(self), err)]
    pub async fn list_results(
        &self,
        user_id: Uuid,
        filters: &ResultFilters,
    ) -> DomainResult<Vec<ReconciledResult>> {
        let authoritative = self.results.list_for_user(user_id, filters).await?;
        let archived = self.archived_records(user_id).await?;

        let authoritative_ids: HashSet<Uuid> = authoritative.iter().map(|r| r.id).collect();

        // Field-level divergence on a shared id is an integrity signal
        // for operators; the reader still self-heals by dropping the
        // archived copy.
        for record in archived.iter().filter(|r| authoritative_ids.contains(&r.id)) {
            if let Some(primary) = authoritative.iter().find(|r| r.id == record.id) {
                if primary.overall_score != record.overall_score {
                    warn!(
                        result_id = %record.id,
                        primary_score = primary.overall_score,
                        archived_score = record.overall_score,
                        "Primary/archive score mismatch, preferring primary"
                    );
                }
            }
        }

        let type_by_test = self.test_types_for(&authoritative).await;

        let mut merged: Vec<ReconciledResult> = authoritative
            .into_iter()
            .map(|r| {
                let test_type = type_by_test
                    .get(&r.test_id)
                    .cloned()
                    .unwrap_or_else(|| r.test_id.clone());
                reconcile_authoritative(r, test_type)
            })
            .collect();

        merged.extend(
            archived
                .into_iter()
                .filter(|record| !authoritative_ids.contains(&record.id))
                .filter(|record| filters.matches(&record.test_id, record.completed_at))
                .map(reconcile_archived),
        );

        merged.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

        if let Some(limit) = filters.limit {
            merged.truncate(limit);
        }

        Ok(merged)
    }

    /// Aggregates over the deduplicated view. Counting the raw
    /// concatenation instead would double every mirrored result.
    #[instrument(skip(self), err)]
    pub async fn statistics(
        &self,
        user_id: Uuid,
        filters: &ResultFilters,
    ) -> DomainResult<ResultStatistics> {
        let merged = self.list_results(user_id, filters).await?;
        Ok(compute_statistics(&merged))
    }

    /// Archived records via the index; a broken index falls back to the
    /// full directory scan, logged as a recovery event.
    async fn archived_records(&self, user_id: Uuid) -> DomainResult<Vec<ArchivedResultRecord>> {
        let entries = match self.archive.load_index(user_id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    %user_id,
                    error = %e,
                    "Archive index unreadable, falling back to full scan"
                );
                return self.archive.scan_user_records(user_id).await;
            }
        };

        let reads = entries
            .iter()
            .map(|entry| self.archive.read_record(&entry.file_path));

        match futures::future::try_join_all(reads).await {
            Ok(records) => Ok(records),
            Err(e) => {
                // A dangling pointer means the index and the tree
                // disagree; rebuild the view from the tree itself.
                info!(
                    %user_id,
                    error = %e,
                    "Index entry unreadable, falling back to full scan"
                );
                self.archive.scan_user_records(user_id).await
            }
        }
    }

    async fn test_types_for(&self, results: &[TestResult]) -> HashMap<String, String> {
        let mut types = HashMap::new();
        for result in results {
            if types.contains_key(&result.test_id) {
                continue;
            }
            if let Ok(Some(test)) = self.catalog.get_test(&result.test_id).await {
                types.insert(result.test_id.clone(), test.test_type);
            }
        }
        types
    }
}

fn reconcile_authoritative(result: TestResult, test_type: String) -> ReconciledResult {
    ReconciledResult {
        id: result.id,
        session_id: result.session_id,
        user_id: result.user_id,
        test_id: result.test_id,
        test_type,
        overall_score: result.overall_score,
        dimension_scores: result.dimension_scores,
        duration_seconds: result.duration_seconds,
        completed_at: result.completed_at,
        source: ResultSource::Authoritative,
    }
}

fn reconcile_archived(record: ArchivedResultRecord) -> ReconciledResult {
    ReconciledResult {
        id: record.id,
        session_id: record.session_id,
        user_id: record.user_id,
        test_id: record.test_id,
        test_type: record.test_type,
        overall_score: record.overall_score,
        dimension_scores: record.dimension_scores,
        duration_seconds: record.duration_seconds,
        completed_at: record.completed_at,
        source: ResultSource::Archive,
    }
}

/// Aggregate an already-deduplicated view.
fn compute_statistics(merged: &[ReconciledResult]) -> ResultStatistics {
    let mut stats = ResultStatistics {
        total: merged.len() as u64,
        ..ResultStatistics::default()
    };

    if merged.is_empty() {
        return stats;
    }

    let sum: u64 = merged.iter().map(|r| u64::from(r.overall_score)).sum();
    stats.average_score = Some(sum as f64 / merged.len() as f64);

    for result in merged {
        *stats.by_test_type.entry(result.test_type.clone()).or_default() += 1;
    }

    stats.oldest = merged.iter().map(|r| r.completed_at).min();
    stats.newest = merged.iter().map(|r| r.completed_at).max();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(score: u8, test_type: &str) -> ReconciledResult {
        ReconciledResult {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            test_id: "t".into(),
            test_type: test_type.into(),
            overall_score: score,
            dimension_scores: BTreeMap::new(),
            duration_seconds: 60,
            completed_at: Utc::now(),
            source: ResultSource::Authoritative,
        }
    }

    #[test]
    fn statistics_over_empty_view() {
        let stats = compute_statistics(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_score, None);
        assert!(stats.oldest.is_none());
    }

    #[test]
    fn statistics_average_and_categories() {
        let merged = vec![entry(80, "personality"), entry(60, "personality"), entry(70, "iq")];
        let stats = compute_statistics(&merged);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.average_score, Some(70.0));
        assert_eq!(stats.by_test_type["personality"], 2);
        assert_eq!(stats.by_test_type["iq"], 1);
    }
}
