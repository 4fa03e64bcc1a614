//! Server-side session store.
//!
//! Session values live in a backing store keyed by an object-id style
//! [`SessionId`]. The client only ever sees an opaque token: the identifier,
//! bound to the session name, authenticated with HMAC-SHA256 and carried by a
//! [`TokenTransport`] (a cookie by default).
//!
//! ```rust,ignore
//! use cellar::{InMemoryRecordBackend, KeyPair, SessionStore, StoreConfig};
//!
//! let config = StoreConfig {
//!     key_pairs: vec![KeyPair::new("a-hash-key-of-at-least-32-bytes!!")],
//!     ..StoreConfig::default()
//! };
//! let store = SessionStore::new(InMemoryRecordBackend::new(), config)?;
//!
//! let mut session = store.new_session(request.headers(), "sid").await?;
//! session.insert("user", "alice")?;
//! store.save(response.headers_mut(), &mut session).await?;
//! ```

use std::fmt;

pub mod codec;
pub mod config;
mod id;
pub mod record;
mod registry;
mod secret;
pub mod session;
mod store;
pub mod transport;

#[cfg(feature = "sqlx_postgres")]
pub mod postgres;
#[cfg(feature = "sqlx_sqlite")]
pub mod sqlite;

pub use codec::{CodecError, KeyPair, KeyRing, SecureCodec};
pub use config::StoreConfig;
pub use id::SessionId;
#[cfg(any(test, feature = "mocks"))]
pub use record::MockRecordBackend;
pub use record::{
    FileRecordBackend, InMemoryRecordBackend, RecordBackend, SessionRecord,
    SessionRecordRepository,
};
pub use registry::Registry;
pub use secret::SecretKey;
pub use session::{MODIFIED_KEY, SameSite, Session, SessionOptions, SessionValues};
pub use store::SessionStore;
pub use transport::{CookieTransport, HeaderTransport, TokenTransport};

/// Errors produced by the session store.
///
/// [`NotFound`](SessionError::NotFound) and
/// [`PayloadDecode`](SessionError::PayloadDecode) are recoverable: a lookup
/// that hits them yields a fresh session instead of an error. Everything else
/// reaches the caller unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The identifier is not a 24 character hex object id.
    InvalidIdentifier,
    /// The token failed authentication or could not be parsed.
    Decode(CodecError),
    /// No record exists for the identifier.
    NotFound,
    /// The stored payload failed authentication or could not be parsed.
    PayloadDecode(CodecError),
    /// A backing store call exceeded the configured timeout.
    Timeout { operation: &'static str },
    /// The backing store reported an error.
    StoreUnavailable(String),
    /// The identifier or values could not be encoded.
    Encode(CodecError),
    /// A reserved key was used in the value mapping.
    ReservedKey(String),
    /// A token could not be written to the response.
    Transport(String),
    /// The store was built with an unusable configuration.
    Configuration(String),
}

impl SessionError {
    /// Returns true for the error kinds a lookup absorbs into a new session.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SessionError::NotFound | SessionError::PayloadDecode(_))
    }
}

impl std::error::Error for SessionError {}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidIdentifier => write!(f, "Invalid session identifier"),
            SessionError::Decode(err) => write!(f, "Failed to decode session token: {err}"),
            SessionError::NotFound => write!(f, "Session not found"),
            SessionError::PayloadDecode(err) => {
                write!(f, "Failed to decode session payload: {err}")
            }
            SessionError::Timeout { operation } => {
                write!(f, "Session store operation timed out: {operation}")
            }
            SessionError::StoreUnavailable(msg) => write!(f, "Session store error: {msg}"),
            SessionError::Encode(err) => write!(f, "Failed to encode session: {err}"),
            SessionError::ReservedKey(key) => write!(f, "Reserved session key: {key}"),
            SessionError::Transport(msg) => write!(f, "Failed to write session token: {msg}"),
            SessionError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}
