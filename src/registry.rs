use std::collections::HashMap;
use std::collections::hash_map::Entry;

use http::HeaderMap;

use crate::record::RecordBackend;
use crate::transport::TokenTransport;
use crate::{Session, SessionError, SessionStore};

/// Sessions loaded during one request, keyed by name.
///
/// Create one per request and drop it with the request. The first
/// [`get`](Registry::get) for a name loads the session; later calls return
/// the same session, or the same error if loading failed.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<String, Result<Session, SessionError>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub async fn get<B: RecordBackend, T: TokenTransport>(
        &mut self,
        store: &SessionStore<B, T>,
        request: &HeaderMap,
        name: &str,
    ) -> Result<&mut Session, SessionError> {
        let slot = match self.sessions.entry(name.to_owned()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(store.new_session(request, name).await),
        };
        slot.as_mut().map_err(|e| e.clone())
    }

    /// Saves every session loaded through this registry.
    ///
    /// All sessions are attempted; the first error is returned.
    pub async fn save_all<B: RecordBackend, T: TokenTransport>(
        &mut self,
        store: &SessionStore<B, T>,
        response: &mut HeaderMap,
    ) -> Result<(), SessionError> {
        let mut first_error = None;
        for (name, slot) in &mut self.sessions {
            let Ok(session) = slot else { continue };
            if let Err(e) = store.save(response, session).await {
                log::error!(target: "cellar::store", "msg=\"failed to save session\" name=\"{name}\" error=\"{e}\"");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
