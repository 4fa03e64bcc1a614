#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RecordBackend, SessionRecord};
use crate::{SessionError, SessionId};

#[derive(Debug, Default)]
struct CallLog {
    find: usize,
    upsert: usize,
    remove: usize,
    prune: usize,
}

/// Recording backend with fault injection.
///
/// Counts every call, can be told to fail with
/// [`SessionError::StoreUnavailable`], and can be slowed down to exercise
/// timeouts.
#[derive(Clone, Default)]
pub struct MockRecordBackend {
    pub records: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
    calls: Arc<Mutex<CallLog>>,
    failure: Arc<Mutex<Option<String>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockRecordBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total backend calls of any kind.
    pub fn calls(&self) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.find + calls.upsert + calls.remove + calls.prune
    }

    pub fn find_calls(&self) -> usize {
        self.calls.lock().unwrap().find
    }

    pub fn upsert_calls(&self) -> usize {
        self.calls.lock().unwrap().upsert
    }

    pub fn remove_calls(&self) -> usize {
        self.calls.lock().unwrap().remove
    }

    /// Makes every subsequent call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_owned());
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Delays every subsequent call by `delay` before it runs.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Stores `record` directly, bypassing call counting.
    pub fn seed(&self, record: SessionRecord) {
        let id = SessionId::parse(&record.id).unwrap();
        self.records.lock().unwrap().insert(id, record);
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    async fn enter(&self, count: impl FnOnce(&mut CallLog)) -> Result<(), SessionError> {
        count(&mut *self.calls.lock().unwrap());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failure.lock().unwrap().clone();
        failure.map_or(Ok(()), |message| Err(SessionError::StoreUnavailable(message)))
    }
}

#[async_trait]
impl RecordBackend for MockRecordBackend {
    async fn find(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        self.enter(|calls| calls.find += 1).await?;
        Ok(self.get(id))
    }

    async fn upsert(&self, record: &SessionRecord) -> Result<(), SessionError> {
        self.enter(|calls| calls.upsert += 1).await?;
        let id = SessionId::parse(&record.id)?;
        self.records.lock().unwrap().insert(id, record.clone());
        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<bool, SessionError> {
        self.enter(|calls| calls.remove += 1).await?;
        Ok(self.records.lock().unwrap().remove(id).is_some())
    }

    async fn prune_modified_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SessionError> {
        self.enter(|calls| calls.prune += 1).await?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|_, record| record.modified >= cutoff);
        let pruned = before - records.len();
        drop(records);
        Ok(pruned as u64)
    }
}
