//! Store behavior against a recording backend with injected faults.
//!
//! Run with: `cargo test --features mocks --test mock_backend`

#![cfg(feature = "mocks")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use cellar::{
    KeyPair, MockRecordBackend, SessionError, SessionRecord, SessionRecordRepository,
    SessionStore, StoreConfig,
};
use chrono::Utc;
use http::HeaderMap;
use http::header::{COOKIE, SET_COOKIE};

fn setup() -> (MockRecordBackend, SessionStore<MockRecordBackend>) {
    let backend = MockRecordBackend::new();
    let config = StoreConfig {
        operation_timeout: Duration::from_millis(500),
        ..StoreConfig::new(vec![KeyPair::new("mock-backend-hash-key-long-enough-0")])
    };
    let store = SessionStore::new(backend.clone(), config).unwrap();
    (backend, store)
}

#[tokio::test]
async fn test_invalid_identifiers_skip_backend() {
    let repository =
        SessionRecordRepository::new(MockRecordBackend::new(), Duration::from_secs(1));

    for id in ["", "abc", "507f1f77bcf86cd79943901", "507f1f77bcf86cd7994390111", "507f1f77bcf86cd79943901g"] {
        assert_eq!(repository.load(id).await, Err(SessionError::InvalidIdentifier));
        assert_eq!(repository.delete(id).await, Err(SessionError::InvalidIdentifier));
        let record = SessionRecord {
            id: id.to_owned(),
            payload: String::new(),
            modified: Utc::now(),
        };
        assert_eq!(repository.upsert(&record).await, Err(SessionError::InvalidIdentifier));
    }

    assert_eq!(repository.backend().calls(), 0);
}

#[tokio::test]
async fn test_failed_upsert_writes_no_token() {
    let (backend, store) = setup();
    backend.fail_with("primary unreachable");

    let mut session = store.create_new("sid");
    session.insert("user", "alice").unwrap();

    let mut response = HeaderMap::new();
    let err = store.save(&mut response, &mut session).await.unwrap_err();

    assert_eq!(err, SessionError::StoreUnavailable("primary unreachable".to_owned()));
    assert!(response.get(SET_COOKIE).is_none());
    assert!(session.is_new());
    assert!(session.id().is_none());
    assert_eq!(backend.upsert_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_times_out_on_save() {
    let (backend, store) = setup();
    backend.set_delay(Duration::from_secs(10));

    let mut session = store.create_new("sid");
    let mut response = HeaderMap::new();
    let err = store.save(&mut response, &mut session).await.unwrap_err();

    assert_eq!(err, SessionError::Timeout { operation: "upsert" });
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_load_failure_propagates() {
    let (backend, store) = setup();

    let mut session = store.create_new("sid");
    let mut response = HeaderMap::new();
    store.save(&mut response, &mut session).await.unwrap();

    let cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
    let mut request = HeaderMap::new();
    request.insert(COOKIE, cookie.split(';').next().unwrap().parse().unwrap());

    backend.fail_with("connection reset");
    let err = store.new_session(&request, "sid").await.unwrap_err();
    assert_eq!(err, SessionError::StoreUnavailable("connection reset".to_owned()));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_expire_unsaved_session_never_calls_backend() {
    let (backend, store) = setup();

    let mut session = store.create_new("sid");
    session.options.expire();
    let mut response = HeaderMap::new();
    store.save(&mut response, &mut session).await.unwrap();

    assert_eq!(backend.calls(), 0);
    assert!(response.get(SET_COOKIE).is_some());
}

#[tokio::test]
async fn test_delete_of_missing_record_succeeds() {
    let (backend, store) = setup();

    let mut session = store.create_new("sid");
    store.save(&mut HeaderMap::new(), &mut session).await.unwrap();
    store.repository().delete(&session.id().unwrap().to_hex()).await.unwrap();

    let mut response = HeaderMap::new();
    store.delete(&mut response, &mut session).await.unwrap();
    assert_eq!(backend.remove_calls(), 2);
    assert!(backend.is_empty());
}
