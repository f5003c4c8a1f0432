//! File-based archive store.
//!
//! Records are serialized JSON under
//! `root/{year}/{month}/{test_type}/{result_id}.json`; the per-user
//! pointer index lives under `root/index/by-user/{user_id}.json`.
//! Records are written once via temp-file rename and never mutated.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ArchiveIndexEntry, ArchivedResultRecord};
use crate::domain::ports::ArchiveStore;

/// Directory under the root holding per-user indexes.
const INDEX_DIR: &str = "index/by-user";

#[derive(Debug, Clone)]
pub struct FileArchiveStore {
    root: PathBuf,
}

impl FileArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn index_path(&self, user_id: Uuid) -> PathBuf {
        self.root.join(INDEX_DIR).join(format!("{user_id}.json"))
    }

    /// Serialize to a sibling temp file, then rename into place.
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> DomainResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_index_file(&self, user_id: Uuid) -> DomainResult<Vec<ArchiveIndexEntry>> {
        let path = self.index_path(user_id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(DomainError::ArchiveIo(e)),
        }
    }
}

#[async_trait]
impl ArchiveStore for FileArchiveStore {
    async fn write_record(&self, record: &ArchivedResultRecord) -> DomainResult<bool> {
        let path = self.record_path(&record.file_path);

        // Records are immutable; an existing file means this id was
        // archived already and the retry is a no-op.
        if fs::try_exists(&path).await? {
            return Ok(false);
        }

        let bytes = serde_json::to_vec_pretty(record)?;
        self.write_atomic(&path, &bytes).await?;
        Ok(true)
    }

    async fn append_index_entry(
        &self,
        user_id: Uuid,
        entry: &ArchiveIndexEntry,
    ) -> DomainResult<()> {
        let mut entries = self.read_index_file(user_id).await?;

        if entries.iter().any(|e| e.id == entry.id) {
            return Ok(());
        }

        entries.push(entry.clone());
        entries.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

        let bytes = serde_json::to_vec_pretty(&entries)?;
        self.write_atomic(&self.index_path(user_id), &bytes).await
    }

    async fn load_index(&self, user_id: Uuid) -> DomainResult<Vec<ArchiveIndexEntry>> {
        self.read_index_file(user_id).await
    }

    async fn read_record(&self, file_path: &str) -> DomainResult<ArchivedResultRecord> {
        let bytes = fs::read(self.record_path(file_path)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn scan_user_records(&self, user_id: Uuid) -> DomainResult<Vec<ArchivedResultRecord>> {
        let index_root = self.root.join("index");
        let mut records = Vec::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(DomainError::ArchiveIo(e)),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path == index_root {
                    continue;
                }
                if entry.file_type().await?.is_dir() {
                    stack.push(path);
                } else if path.extension().is_some_and(|ext| ext == "json") {
                    let bytes = fs::read(&path).await?;
                    match serde_json::from_slice::<ArchivedResultRecord>(&bytes) {
                        Ok(record) if record.user_id == user_id => records.push(record),
                        Ok(_) => {}
                        Err(e) => {
                            // An unreadable record is logged and skipped;
                            // the scan is a recovery path and must return
                            // everything it can.
                            tracing::warn!(path = %path.display(), error = %e,
                                "Skipping unreadable archive record during scan");
                        }
                    }
                }
            }
        }

        records.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(records)
    }
}
