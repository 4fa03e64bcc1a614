mod options;

use chrono::{DateTime, Utc};
pub use options::{SameSite, SessionOptions};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{SessionError, SessionId};

/// Application-visible session data.
pub type SessionValues = serde_json::Map<String, Value>;

/// Key that may not appear in [`SessionValues`].
///
/// The modification time is carried by [`Session::set_modified`] instead.
pub const MODIFIED_KEY: &str = "modified";

/// An in-memory session for the duration of one request.
///
/// A session is either loaded from the backing store (`is_new() == false`)
/// or freshly created, in which case it has no identifier until it is first
/// saved.
#[derive(Debug, Clone)]
pub struct Session {
    name: String,
    id: Option<SessionId>,
    values: SessionValues,
    is_new: bool,
    modified: Option<DateTime<Utc>>,
    last_modified: Option<DateTime<Utc>>,
    pub options: SessionOptions,
}

impl Session {
    /// Creates an empty, unsaved session.
    pub fn new(name: impl Into<String>, options: SessionOptions) -> Self {
        Self {
            name: name.into(),
            id: None,
            values: SessionValues::new(),
            is_new: true,
            modified: None,
            last_modified: None,
            options,
        }
    }

    pub(crate) fn loaded(
        name: &str,
        id: SessionId,
        values: SessionValues,
        last_modified: DateTime<Utc>,
        options: SessionOptions,
    ) -> Self {
        Self {
            name: name.to_owned(),
            id: Some(id),
            values,
            is_new: false,
            modified: None,
            last_modified: Some(last_modified),
            options,
        }
    }

    /// The name the session was requested under. Tokens are bound to it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identifier, or `None` until the first successful save.
    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    /// True until the session has been loaded from or saved to the store.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Records a successful save under `id`.
    pub(crate) fn mark_persisted(&mut self, id: SessionId, modified: DateTime<Utc>) {
        self.id = Some(id);
        self.is_new = false;
        self.last_modified = Some(modified);
    }

    pub fn values(&self) -> &SessionValues {
        &self.values
    }

    /// Mutable access to the raw mapping.
    ///
    /// Writing [`MODIFIED_KEY`] through this bypasses [`Session::insert`]
    /// and makes the next save fail with [`SessionError::ReservedKey`].
    pub fn values_mut(&mut self) -> &mut SessionValues {
        &mut self.values
    }

    /// Returns the value under `key`, deserialized into `T`.
    ///
    /// Returns `None` if the key is missing or holds a different shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Stores `value` under `key` and returns the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ReservedKey`] for [`MODIFIED_KEY`].
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, SessionError> {
        let key = key.into();
        if key == MODIFIED_KEY {
            return Err(SessionError::ReservedKey(key));
        }
        Ok(self.values.insert(key, value.into()))
    }

    /// Serializes `value` and stores it under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ReservedKey`] for [`MODIFIED_KEY`] and
    /// [`SessionError::Encode`] if `value` cannot be serialized.
    pub fn insert_serialized<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Option<Value>, SessionError> {
        let value = serde_json::to_value(value)
            .map_err(|e| SessionError::Encode(crate::CodecError::Serialization(e.to_string())))?;
        self.insert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Overrides the modification time written on the next save.
    ///
    /// Without an override the record is stamped with the time of the write.
    /// Use this to track logical activity for idle expiry independent of
    /// physical writes.
    pub fn set_modified(&mut self, modified: DateTime<Utc>) {
        self.modified = Some(modified);
    }

    /// The override set with [`Session::set_modified`], if any.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    /// The modification time of the record this session was loaded from,
    /// or of the last save.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_new_session_is_empty() {
        let session = Session::new("sid", SessionOptions::default());
        assert_eq!(session.name(), "sid");
        assert!(session.is_new());
        assert!(session.id().is_none());
        assert!(session.values().is_empty());
        assert!(session.modified().is_none());
        assert!(session.last_modified().is_none());
    }

    #[test]
    fn test_insert_and_get() {
        let mut session = Session::new("sid", SessionOptions::default());
        assert_eq!(session.insert("user", "alice").unwrap(), None);
        assert_eq!(session.insert("visits", 3).unwrap(), None);

        assert_eq!(session.get::<String>("user").as_deref(), Some("alice"));
        assert_eq!(session.get::<u32>("visits"), Some(3));
        assert_eq!(session.get::<u32>("user"), None);
        assert_eq!(session.get::<String>("missing"), None);

        let previous = session.insert("user", "bob").unwrap();
        assert_eq!(previous, Some(json!("alice")));
    }

    #[test]
    fn test_insert_rejects_reserved_key() {
        let mut session = Session::new("sid", SessionOptions::default());
        let err = session.insert(MODIFIED_KEY, "yesterday").unwrap_err();
        assert_eq!(err, SessionError::ReservedKey(MODIFIED_KEY.to_owned()));
        assert!(session.values().is_empty());
    }

    #[test]
    fn test_insert_serialized() {
        #[derive(Serialize)]
        struct Cart {
            items: Vec<u32>,
        }

        let mut session = Session::new("sid", SessionOptions::default());
        session
            .insert_serialized("cart", &Cart { items: vec![1, 2] })
            .unwrap();
        assert_eq!(session.values()["cart"], json!({ "items": [1, 2] }));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut session = Session::new("sid", SessionOptions::default());
        session.insert("a", 1).unwrap();
        session.insert("b", 2).unwrap();

        assert_eq!(session.remove("a"), Some(json!(1)));
        assert_eq!(session.remove("a"), None);

        session.clear();
        assert!(session.values().is_empty());
    }

    #[test]
    fn test_mark_persisted() {
        let mut session = Session::new("sid", SessionOptions::default());
        let id = SessionId::generate();
        let now = Utc::now();
        session.mark_persisted(id, now);

        assert!(!session.is_new());
        assert_eq!(session.id(), Some(id));
        assert_eq!(session.last_modified(), Some(now));
    }

    #[test]
    fn test_modified_override() {
        let mut session = Session::new("sid", SessionOptions::default());
        let when = Utc::now() - Duration::minutes(10);
        session.set_modified(when);
        assert_eq!(session.modified(), Some(when));
    }
}
