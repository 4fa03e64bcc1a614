//! Persisted session records.
//!
//! [`SessionRecordRepository`] is the only path from the store to a
//! [`RecordBackend`]. It validates identifiers before any backend call and
//! bounds every call with a timeout, so backends only ever see well-formed
//! [`SessionId`]s.

mod file;
mod memory;
#[cfg(any(test, feature = "mocks"))]
mod mock;

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
pub use file::FileRecordBackend;
pub use memory::InMemoryRecordBackend;
#[cfg(any(test, feature = "mocks"))]
pub use mock::MockRecordBackend;
use serde::{Deserialize, Serialize};

use crate::{SessionError, SessionId};

/// The persisted unit: one record per identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Hex rendering of the [`SessionId`].
    pub id: String,
    /// Encoded session values.
    pub payload: String,
    pub modified: DateTime<Utc>,
}

/// Storage driver for session records.
///
/// Implementations provide different storage backends:
/// - [`InMemoryRecordBackend`]: in-process map for testing and single instances
/// - [`FileRecordBackend`]: one JSON file per record
/// - `SqliteRecordBackend` / `PostgresRecordBackend`: behind the
///   `sqlx_sqlite` / `sqlx_postgres` features
///
/// Concurrent writers to the same identifier are not coordinated; the last
/// upsert wins.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    async fn find(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError>;

    /// Inserts the record, replacing any record with the same identifier.
    async fn upsert(&self, record: &SessionRecord) -> Result<(), SessionError>;

    /// Returns whether a record was removed.
    async fn remove(&self, id: &SessionId) -> Result<bool, SessionError>;

    /// Removes records last modified before `cutoff`.
    ///
    /// Returns the number of records pruned.
    async fn prune_modified_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SessionError>;
}

/// Validating, time-bounded access to a [`RecordBackend`].
#[derive(Debug, Clone)]
pub struct SessionRecordRepository<B> {
    backend: B,
    timeout: Duration,
}

impl<B: RecordBackend> SessionRecordRepository<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, SessionError>>,
    ) -> Result<T, SessionError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                log::error!(target: "cellar::record", "msg=\"backing store timed out\" operation=\"{operation}\" timeout_ms=\"{}\"", self.timeout.as_millis());
                SessionError::Timeout { operation }
            })?
    }

    /// Loads the record for `id`.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidIdentifier`] without touching the backend if
    /// `id` is malformed, [`SessionError::NotFound`] if no record exists.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn load(&self, id: &str) -> Result<SessionRecord, SessionError> {
        let id = SessionId::parse(id)?;
        self.bounded("load", self.backend.find(&id))
            .await?
            .ok_or(SessionError::NotFound)
    }

    /// Writes the record, keyed by its identifier. Repeating an identical
    /// upsert succeeds and leaves a single record.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(id = %record.id), err))]
    pub async fn upsert(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let id = SessionId::parse(&record.id)?.to_hex();
        let record = if id == record.id {
            Cow::Borrowed(record)
        } else {
            Cow::Owned(SessionRecord {
                id,
                ..record.clone()
            })
        };
        self.bounded("upsert", self.backend.upsert(&record)).await
    }

    /// Deletes the record for `id`. A missing record is not an error.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn delete(&self, id: &str) -> Result<(), SessionError> {
        let id = SessionId::parse(id)?;
        let removed = self.bounded("delete", self.backend.remove(&id)).await?;
        if !removed {
            log::debug!(target: "cellar::record", "msg=\"delete of missing record ignored\" id=\"{id}\"");
        }
        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn prune_modified_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SessionError> {
        self.bounded("prune", self.backend.prune_modified_before(cutoff))
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;

    fn repository(backend: MockRecordBackend) -> SessionRecordRepository<MockRecordBackend> {
        SessionRecordRepository::new(backend, Duration::from_secs(5))
    }

    fn record(id: &SessionId) -> SessionRecord {
        SessionRecord {
            id: id.to_hex(),
            payload: "payload".to_owned(),
            modified: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_load() {
        let backend = MockRecordBackend::new();
        let repo = repository(backend.clone());
        let id = SessionId::generate();

        repo.upsert(&record(&id)).await.unwrap();
        let loaded = repo.load(&id.to_hex()).await.unwrap();
        assert_eq!(loaded.payload, "payload");
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let backend = MockRecordBackend::new();
        let repo = repository(backend.clone());
        let id = SessionId::generate();
        let rec = record(&id);

        repo.upsert(&rec).await.unwrap();
        repo.upsert(&rec).await.unwrap();
        assert_eq!(backend.len(), 1);
        assert_eq!(repo.load(&id.to_hex()).await.unwrap(), rec);
    }

    #[tokio::test]
    async fn test_upsert_normalizes_identifier() {
        let backend = MockRecordBackend::new();
        let repo = repository(backend.clone());
        let id = SessionId::parse("507f1f77bcf86cd799439011").unwrap();

        let mut rec = record(&id);
        rec.id = rec.id.to_uppercase();
        repo.upsert(&rec).await.unwrap();

        let loaded = repo.load("507f1f77bcf86cd799439011").await.unwrap();
        assert_eq!(loaded.id, "507f1f77bcf86cd799439011");
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let repo = repository(MockRecordBackend::new());
        let err = repo.load(&SessionId::generate().to_hex()).await.unwrap_err();
        assert_eq!(err, SessionError::NotFound);
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let backend = MockRecordBackend::new();
        let repo = repository(backend.clone());
        repo.delete(&SessionId::generate().to_hex()).await.unwrap();
        assert_eq!(backend.remove_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_identifier_never_reaches_backend() {
        let backend = MockRecordBackend::new();
        let repo = repository(backend.clone());

        assert_eq!(repo.load("nope").await, Err(SessionError::InvalidIdentifier));
        assert_eq!(repo.delete("../../etc/passwd").await, Err(SessionError::InvalidIdentifier));

        let bad = SessionRecord {
            id: "zzzzzzzzzzzzzzzzzzzzzzzz".to_owned(),
            payload: String::new(),
            modified: Utc::now(),
        };
        assert_eq!(repo.upsert(&bad).await, Err(SessionError::InvalidIdentifier));

        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let backend = MockRecordBackend::new();
        backend.set_delay(Duration::from_secs(30));
        let repo = repository(backend);

        let id = SessionId::generate().to_hex();
        assert_eq!(
            repo.load(&id).await,
            Err(SessionError::Timeout { operation: "load" })
        );
        assert_eq!(
            repo.delete(&id).await,
            Err(SessionError::Timeout { operation: "delete" })
        );
    }

    #[tokio::test]
    async fn test_backend_errors_pass_through() {
        let backend = MockRecordBackend::new();
        backend.fail_with("connection refused");
        let repo = repository(backend);

        let err = repo.load(&SessionId::generate().to_hex()).await.unwrap_err();
        assert_eq!(err, SessionError::StoreUnavailable("connection refused".to_owned()));
    }

    #[tokio::test]
    async fn test_prune_modified_before() {
        let backend = MockRecordBackend::new();
        let repo = repository(backend.clone());

        let stale_id = SessionId::generate();
        let mut stale = record(&stale_id);
        stale.modified = Utc::now() - ChronoDuration::hours(3);
        repo.upsert(&stale).await.unwrap();
        repo.upsert(&record(&SessionId::generate())).await.unwrap();

        let pruned = repo
            .prune_modified_before(Utc::now() - ChronoDuration::hours(1))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        assert_eq!(backend.len(), 1);
        assert_eq!(repo.load(&stale_id.to_hex()).await, Err(SessionError::NotFound));
    }
}
