//! File-based record storage.
//!
//! Stores each record as a JSON file in a directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RecordBackend, SessionRecord};
use crate::{SessionError, SessionId};

/// File-based record storage.
///
/// Each record is stored as `{id}.json` in the configured directory. Only
/// validated identifiers reach this backend, so file names cannot escape
/// the directory.
///
/// # Example
///
/// ```rust,ignore
/// use cellar::FileRecordBackend;
///
/// let backend = FileRecordBackend::new("/var/lib/myapp/sessions")?;
/// ```
#[derive(Debug, Clone)]
pub struct FileRecordBackend {
    directory: PathBuf,
}

impl FileRecordBackend {
    /// Creates the backend, creating `directory` if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| {
            SessionError::StoreUnavailable(format!("Failed to create session directory: {e}"))
        })?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn record_path(&self, id: &SessionId) -> PathBuf {
        self.directory.join(format!("{id}.json"))
    }

    async fn read_record(path: &Path) -> Result<Option<SessionRecord>, SessionError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::StoreUnavailable(format!(
                    "Failed to read session file: {e}"
                )));
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            SessionError::StoreUnavailable(format!("Failed to parse session file: {e}"))
        })
    }
}

#[async_trait]
impl RecordBackend for FileRecordBackend {
    async fn find(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        Self::read_record(&self.record_path(id)).await
    }

    async fn upsert(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let id = SessionId::parse(&record.id)?;
        let path = self.record_path(&id);
        // Unique per write so concurrent upserts of one id only race on the rename.
        let staging = self
            .directory
            .join(format!("{id}.{:016x}.tmp", rand::random::<u64>()));

        let content = serde_json::to_string_pretty(record).map_err(|e| {
            SessionError::StoreUnavailable(format!("Failed to serialize session: {e}"))
        })?;

        // Write then rename so readers never observe a partial file.
        tokio::fs::write(&staging, content).await.map_err(|e| {
            SessionError::StoreUnavailable(format!("Failed to write session file: {e}"))
        })?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            tokio::fs::remove_file(&staging).await.ok();
            return Err(SessionError::StoreUnavailable(format!(
                "Failed to write session file: {e}"
            )));
        }

        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<bool, SessionError> {
        match tokio::fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionError::StoreUnavailable(format!(
                "Failed to delete session file: {e}"
            ))),
        }
    }

    async fn prune_modified_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SessionError> {
        let mut entries = tokio::fs::read_dir(&self.directory).await.map_err(|e| {
            SessionError::StoreUnavailable(format!("Failed to read session directory: {e}"))
        })?;

        let mut pruned = 0;
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            SessionError::StoreUnavailable(format!("Failed to read session directory: {e}"))
        })? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }

            match Self::read_record(&path).await {
                Ok(Some(record)) if record.modified < cutoff => {
                    if tokio::fs::remove_file(&path).await.is_ok() {
                        pruned += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!(target: "cellar::record", "msg=\"skipping unreadable session file\" path=\"{}\" error=\"{e}\"", path.display());
                }
            }
        }

        Ok(pruned)
    }
}
