//! Store configuration.
//!
//! A [`StoreConfig`] is handed to [`SessionStore::new`](crate::SessionStore::new)
//! once and is immutable afterwards, apart from the explicit max-age and key
//! rotation operations on the store.
//!
//! # Example
//!
//! ```rust
//! use cellar::{KeyPair, StoreConfig};
//!
//! let config = StoreConfig {
//!     cookie_domain: Some("example.com".to_owned()),
//!     max_age: 3600,
//!     key_pairs: vec![KeyPair::new("a-hash-key-of-at-least-32-bytes!!")],
//!     ..StoreConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use crate::KeyPair;
use crate::session::SameSite;

/// Thirty days, in seconds.
pub const DEFAULT_MAX_AGE: i64 = 86400 * 30;

/// Longest token accepted or produced, in bytes.
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 4096;

/// Minimum accepted hash key length in bytes.
pub const MIN_HASH_KEY_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub cookie_path: String,
    pub cookie_domain: Option<String>,
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    pub cookie_same_site: SameSite,

    /// Default session lifetime in seconds, also enforced on token age.
    ///
    /// Default: 30 days
    pub max_age: i64,

    /// Signing and encryption keys, newest first.
    ///
    /// The first pair encodes; every pair is tried, in order, on decode.
    pub key_pairs: Vec<KeyPair>,

    /// Ceiling for every backing store call.
    ///
    /// Default: 5 seconds
    pub operation_timeout: Duration,

    /// Default: 4096 bytes
    pub max_token_length: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cookie_path: "/".to_owned(),
            cookie_domain: None,
            cookie_secure: true,
            cookie_http_only: true,
            cookie_same_site: SameSite::Lax,
            max_age: DEFAULT_MAX_AGE,
            key_pairs: Vec::new(),
            operation_timeout: Duration::from_secs(5),
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values and the given keys.
    pub fn new(key_pairs: Vec<KeyPair>) -> Self {
        Self {
            key_pairs,
            ..Self::default()
        }
    }

    /// Plain-http friendly settings for local development.
    ///
    /// Cookies are not marked secure and sessions last one day.
    pub fn development(key_pairs: Vec<KeyPair>) -> Self {
        Self {
            cookie_secure: false,
            max_age: 86400,
            key_pairs,
            ..Self::default()
        }
    }

    /// Short-lived, strictly scoped sessions.
    pub fn strict(key_pairs: Vec<KeyPair>) -> Self {
        Self {
            cookie_same_site: SameSite::Strict,
            max_age: 3600 * 2,
            operation_timeout: Duration::from_secs(2),
            key_pairs,
            ..Self::default()
        }
    }

    /// Checks key material and limits.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.key_pairs.is_empty() {
            return Err("at least one key pair is required");
        }
        for pair in &self.key_pairs {
            pair.validate()?;
        }
        if self.operation_timeout.is_zero() {
            return Err("operation_timeout must not be zero");
        }
        if self.max_token_length == 0 {
            return Err("max_token_length must not be zero");
        }
        Ok(())
    }
}
