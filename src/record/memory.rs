//! In-memory record storage.
//!
//! Suitable for development, testing, and single-instance deployments.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RecordBackend, SessionRecord};
use crate::{SessionError, SessionId};

/// Records held in a `HashMap` behind a `RwLock`.
///
/// Clones share the same map. Records are lost when the process restarts;
/// use [`FileRecordBackend`](super::FileRecordBackend) or a SQL backend for
/// persistence.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordBackend {
    records: Arc<RwLock<HashMap<SessionId, SessionRecord>>>,
}

impl InMemoryRecordBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records currently stored.
    ///
    /// Reads through a poisoned lock; the backend operations report poisoning
    /// as [`SessionError::StoreUnavailable`].
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all stored records, in no particular order.
    pub fn records(&self) -> Vec<SessionRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

fn poisoned() -> SessionError {
    SessionError::StoreUnavailable("Lock poisoned".to_owned())
}

#[async_trait]
impl RecordBackend for InMemoryRecordBackend {
    async fn find(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(id).cloned())
    }

    async fn upsert(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let id = SessionId::parse(&record.id)?;
        self.records
            .write()
            .map_err(|_| poisoned())?
            .insert(id, record.clone());
        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<bool, SessionError> {
        Ok(self
            .records
            .write()
            .map_err(|_| poisoned())?
            .remove(id)
            .is_some())
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn prune_modified_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SessionError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let before = records.len();
        records.retain(|_, record| record.modified >= cutoff);
        Ok((before - records.len()) as u64)
    }
}
