use chrono::Utc;
use http::HeaderMap;

use crate::record::{RecordBackend, SessionRecord, SessionRecordRepository};
use crate::session::MODIFIED_KEY;
use crate::transport::{CookieTransport, TokenTransport};
use crate::{
    KeyPair, KeyRing, Registry, Session, SessionError, SessionId, SessionOptions, SessionValues,
    StoreConfig,
};

/// Server-side session store.
///
/// Values are persisted through a [`RecordBackend`]; the client only carries
/// a token holding the session identifier. Every call handles one request:
/// nothing is cached between requests, and concurrent requests for the same
/// session are not coordinated (the last save wins).
///
/// # Example
///
/// ```rust,ignore
/// let store = SessionStore::new(backend, StoreConfig::new(vec![pair]))?;
///
/// let mut session = store.new_session(request.headers(), "sid").await?;
/// session.insert("user", "alice")?;
/// store.save(response.headers_mut(), &mut session).await?;
/// ```
pub struct SessionStore<B, T = CookieTransport> {
    repository: SessionRecordRepository<B>,
    codecs: KeyRing,
    transport: T,
    options: SessionOptions,
}

impl<B: RecordBackend> SessionStore<B> {
    /// Creates a cookie-backed store.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if `config` fails validation.
    pub fn new(backend: B, config: StoreConfig) -> Result<Self, SessionError> {
        Self::with_transport(backend, config, CookieTransport::new())
    }
}

impl<B: RecordBackend, T: TokenTransport> SessionStore<B, T> {
    /// Creates a store carrying tokens with `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if `config` fails validation.
    pub fn with_transport(
        backend: B,
        config: StoreConfig,
        transport: T,
    ) -> Result<Self, SessionError> {
        config
            .validate()
            .map_err(|e| SessionError::Configuration(e.to_owned()))?;

        let mut codecs = KeyRing::from_pairs(&config.key_pairs)?;
        codecs.set_max_length(config.max_token_length);
        codecs.set_max_age(config.max_age);

        Ok(Self {
            repository: SessionRecordRepository::new(backend, config.operation_timeout),
            codecs,
            transport,
            options: SessionOptions::from(&config),
        })
    }

    /// Default options copied into every new session.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The validating, time-bounded repository the store persists through.
    pub fn repository(&self) -> &SessionRecordRepository<B> {
        &self.repository
    }

    /// The carrier used to read and write session tokens.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sets the default max-age for new sessions and the maximum token age
    /// enforced on decode.
    ///
    /// A negative value makes new sessions expire on save and disables the
    /// token age check.
    pub fn set_max_age(&mut self, secs: i64) {
        self.options.max_age = secs;
        self.codecs.set_max_age(secs);
    }

    /// Adds `pair` as the newest key. Tokens issued under the existing keys
    /// remain valid.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if the pair is unusable.
    pub fn rotate_keys(&mut self, pair: &KeyPair) -> Result<(), SessionError> {
        pair.validate()
            .map_err(|e| SessionError::Configuration(e.to_owned()))?;
        self.codecs.rotate(pair)?;
        log::info!(target: "cellar::store", "msg=\"session keys rotated\" key_count=\"{}\"", self.codecs.len());
        Ok(())
    }

    /// Returns an empty, unsaved session with the store's default options.
    pub fn create_new(&self, name: &str) -> Session {
        Session::new(name, self.options.clone())
    }

    /// Loads the session named `name` for `request`, or starts a new one.
    ///
    /// Without a token, or when the record is missing or its payload fails
    /// to decode, the result is a new empty session. A token that fails to
    /// decode is an error, as is any backing store failure.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, request), err))]
    pub async fn new_session(
        &self,
        request: &HeaderMap,
        name: &str,
    ) -> Result<Session, SessionError> {
        let Some(token) = self.transport.get_token(request, name) else {
            return Ok(self.create_new(name));
        };

        let id: String = self
            .codecs
            .decode_value(name, &token)
            .map_err(SessionError::Decode)?;

        match self.load(name, &id).await {
            Ok(session) => Ok(session),
            Err(e) if e.is_recoverable() => {
                log::debug!(target: "cellar::store", "msg=\"starting new session\" name=\"{name}\" reason=\"{e}\"");
                Ok(self.create_new(name))
            }
            Err(e) => Err(e),
        }
    }

    /// Returns the session named `name` from `registry`, loading it on first
    /// access within the request.
    pub async fn get<'r>(
        &self,
        registry: &'r mut Registry,
        request: &HeaderMap,
        name: &str,
    ) -> Result<&'r mut Session, SessionError> {
        registry.get(self, request, name).await
    }

    async fn load(&self, name: &str, id: &str) -> Result<Session, SessionError> {
        let record = self.repository.load(id).await?;
        let values: SessionValues = self
            .codecs
            .decode_value(name, &record.payload)
            .map_err(|e| {
                log::warn!(target: "cellar::store", "msg=\"stored payload rejected\" name=\"{name}\" id=\"{}\" error=\"{e}\"", record.id);
                SessionError::PayloadDecode(e)
            })?;

        let id = SessionId::parse(&record.id)?;
        Ok(Session::loaded(
            name,
            id,
            values,
            record.modified,
            self.options.clone(),
        ))
    }

    /// Persists `session` and writes its token to `response`.
    ///
    /// A session whose `max_age` is negative is deleted instead. The
    /// identifier is generated on the first save and kept once its record is
    /// written, even if writing the token then fails. On any error nothing is
    /// written to `response`.
    ///
    /// # Errors
    ///
    /// [`SessionError::ReservedKey`] if the values hold [`MODIFIED_KEY`],
    /// [`SessionError::Encode`] if the values or token cannot be encoded,
    /// and any repository or transport error.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(name = session.name()), err))]
    pub async fn save(
        &self,
        response: &mut HeaderMap,
        session: &mut Session,
    ) -> Result<(), SessionError> {
        if session.options.is_expired() {
            if let Some(id) = session.id() {
                self.repository.delete(&id.to_hex()).await?;
            }
            return self.clear_token(response, session);
        }

        if session.values().contains_key(MODIFIED_KEY) {
            return Err(SessionError::ReservedKey(MODIFIED_KEY.to_owned()));
        }

        let id = session.id().unwrap_or_else(SessionId::generate);
        let hex = id.to_hex();
        let payload = self
            .codecs
            .encode_value(session.name(), session.values())
            .map_err(SessionError::Encode)?;
        let token = self
            .codecs
            .encode_value(session.name(), &hex)
            .map_err(SessionError::Encode)?;

        let modified = session.modified().unwrap_or_else(Utc::now);
        self.repository
            .upsert(&SessionRecord {
                id: hex,
                payload,
                modified,
            })
            .await?;
        // The record exists from here on; a retry after a transport failure reuses the id.
        session.mark_persisted(id, modified);

        self.transport
            .set_token(response, session.name(), &token, &session.options)
    }

    /// Removes the record for `session` and clears its token.
    ///
    /// The session's values are emptied and its options expired, so a later
    /// save in the same request deletes again rather than resurrecting it.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(name = session.name()), err))]
    pub async fn delete(
        &self,
        response: &mut HeaderMap,
        session: &mut Session,
    ) -> Result<(), SessionError> {
        if let Some(id) = session.id() {
            self.repository.delete(&id.to_hex()).await?;
        }
        session.clear();
        session.options.expire();
        self.clear_token(response, session)
    }

    fn clear_token(&self, response: &mut HeaderMap, session: &Session) -> Result<(), SessionError> {
        let mut options = session.options.clone();
        options.expire();
        self.transport
            .set_token(response, session.name(), "", &options)?;
        log::debug!(target: "cellar::store", "msg=\"session token cleared\" name=\"{}\"", session.name());
        Ok(())
    }

    /// Removes records idle for longer than `idle`.
    ///
    /// Returns the number of records removed.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn prune_idle(&self, idle: chrono::Duration) -> Result<u64, SessionError> {
        let pruned = self
            .repository
            .prune_modified_before(Utc::now() - idle)
            .await?;
        if pruned > 0 {
            log::info!(target: "cellar::store", "msg=\"pruned idle sessions\" count=\"{pruned}\"");
        }
        Ok(pruned)
    }
}
