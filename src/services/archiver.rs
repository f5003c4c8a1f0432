//! Archive outbox consumer.
//!
//! Drains pending archive jobs written by the completion transaction,
//! mirrors each result into the file archive, and appends the owner's
//! index pointer. Failures never touch the authoritative store: a job
//! that keeps failing is retried by later passes until it parks.

use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tracing::{info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ArchiveConfig, ArchiveIndexEntry, ArchiveJob, ArchivedResultRecord, ResultDescriptor,
    TestResult,
};
use crate::domain::ports::{ArchiveQueue, ArchiveStore, ResultRepository, TestCatalog, UserDirectory};

/// Outcome of one outbox drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Jobs picked up this pass.
    pub processed: u64,
    /// Records newly written to the archive.
    pub archived: u64,
    /// Jobs whose record already existed (idempotent replay).
    pub already_archived: u64,
    /// Jobs that failed and stay queued (or parked at max attempts).
    pub failed: u64,
}

/// Mirrors committed results into the append-only archive.
pub struct Archiver {
    queue: Arc<dyn ArchiveQueue>,
    results: Arc<dyn ResultRepository>,
    store: Arc<dyn ArchiveStore>,
    catalog: Arc<dyn TestCatalog>,
    directory: Arc<dyn UserDirectory>,
    config: ArchiveConfig,
}

impl Archiver {
    pub fn new(
        queue: Arc<dyn ArchiveQueue>,
        results: Arc<dyn ResultRepository>,
        store: Arc<dyn ArchiveStore>,
        catalog: Arc<dyn TestCatalog>,
        directory: Arc<dyn UserDirectory>,
        config: ArchiveConfig,
    ) -> Self {
        Self {
            queue,
            results,
            store,
            catalog,
            directory,
            config,
        }
    }

    /// Drain up to `batch_size` pending jobs. Idempotent: re-running
    /// after a crash re-processes the same jobs without duplicating
    /// archive records.
    #[instrument(skip(self), err)]
    pub async fn process_pending(&self) -> DomainResult<ArchiveReport> {
        let jobs = self.queue.pending(self.config.batch_size).await?;
        let mut report = ArchiveReport {
            processed: jobs.len() as u64,
            ..ArchiveReport::default()
        };

        for job in jobs {
            match self.archive_one(&job).await {
                Ok(true) => {
                    self.queue.mark_done(job.result_id).await?;
                    report.archived += 1;
                }
                Ok(false) => {
                    self.queue.mark_done(job.result_id).await?;
                    report.already_archived += 1;
                }
                Err(e) => {
                    warn!(result_id = %job.result_id, error = %e, "Archive write failed");
                    self.queue
                        .record_failure(job.result_id, &e.to_string(), self.config.max_attempts)
                        .await?;
                    report.failed += 1;
                }
            }
        }

        if report.processed > 0 {
            info!(
                processed = report.processed,
                archived = report.archived,
                failed = report.failed,
                "Archive pass finished"
            );
        }
        Ok(report)
    }

    /// Archive a single job. Returns whether a new record was written.
    async fn archive_one(&self, job: &ArchiveJob) -> DomainResult<bool> {
        let result = self
            .results
            .get(job.result_id)
            .await?
            .ok_or_else(|| {
                DomainError::IntegrityMismatch(format!(
                    "archive job points at missing result {}",
                    job.result_id
                ))
            })?;

        let descriptor = self.descriptor_for(&result).await;
        let record = ArchivedResultRecord::from_result(&result, &descriptor);

        let written = self.with_retry(|| self.store.write_record(&record)).await?;

        let entry = ArchiveIndexEntry {
            id: record.id,
            file_path: record.file_path.clone(),
            completed_at: record.completed_at,
        };
        self.with_retry(|| self.store.append_index_entry(result.user_id, &entry))
            .await?;

        Ok(written)
    }

    /// Denormalized descriptors are best effort: a missing catalog
    /// entry falls back to the raw test id rather than blocking the
    /// mirror.
    async fn descriptor_for(&self, result: &TestResult) -> ResultDescriptor {
        let (test_name, test_type) = match self.catalog.get_test(&result.test_id).await {
            Ok(Some(test)) => (test.name, test.test_type),
            _ => (result.test_id.clone(), result.test_id.clone()),
        };
        let user_email = self.directory.email_for(result.user_id).await.unwrap_or_default();

        ResultDescriptor {
            test_name,
            test_type,
            user_email,
        }
    }

    /// Retry transient archive I/O in-process with exponential backoff;
    /// anything else fails the job immediately.
    async fn with_retry<T, F, Fut>(&self, op: F) -> DomainResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = DomainResult<T>>,
    {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_elapsed_time(Some(Duration::from_secs(5)))
            .build();

        backoff::future::retry(policy, || async {
            op().await.map_err(|e| {
                if e.is_transient() {
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }
}
