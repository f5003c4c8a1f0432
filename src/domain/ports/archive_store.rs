//! Archive store port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ArchiveIndexEntry, ArchivedResultRecord};

/// Append-only file archive holding immutable result mirrors plus a
/// per-user pointer index.
///
/// Writes must be idempotent by record id: re-writing an id that is
/// already archived is a no-op, both for the record file and the index.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Write a record at its `file_path` unless one already exists.
    /// Returns whether a file was actually written.
    async fn write_record(&self, record: &ArchivedResultRecord) -> DomainResult<bool>;

    /// Append a pointer to the user's index, deduplicating by id.
    async fn append_index_entry(&self, user_id: Uuid, entry: &ArchiveIndexEntry)
        -> DomainResult<()>;

    /// The user's index, newest completion first. Missing index is an
    /// empty list only when the archive holds nothing for the user;
    /// otherwise callers fall back to [`scan_user_records`].
    ///
    /// [`scan_user_records`]: Self::scan_user_records
    async fn load_index(&self, user_id: Uuid) -> DomainResult<Vec<ArchiveIndexEntry>>;

    /// Load one record by its index pointer path.
    async fn read_record(&self, file_path: &str) -> DomainResult<ArchivedResultRecord>;

    /// Recovery path: walk the whole archive tree and collect the
    /// user's records. Expensive by design; callers log its use.
    async fn scan_user_records(&self, user_id: Uuid) -> DomainResult<Vec<ArchivedResultRecord>>;
}
