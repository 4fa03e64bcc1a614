//! Key material wrapper.
//!
//! Hash and block keys are raw bytes; this keeps them out of `Debug` output
//! and log lines.

use std::fmt;

/// Secret key bytes with redacted formatting.
///
/// # Example
///
/// ```rust
/// use cellar::SecretKey;
///
/// let key = SecretKey::new("a-hash-key-of-at-least-32-bytes!!");
///
/// assert_eq!(format!("{key:?}"), "SecretKey([REDACTED])");
/// assert_eq!(key.len(), 33);
/// ```
#[derive(Clone)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    /// Creates a key from anything that can be viewed as bytes.
    #[must_use]
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self(key.as_ref().to_vec())
    }

    /// Decodes a key from a hex string.
    ///
    /// Returns `None` if the input is not valid hex.
    #[must_use]
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        hex::decode(hex_str.trim()).ok().map(Self)
    }

    /// Exposes the raw key bytes.
    #[must_use]
    pub fn expose_secret(&self) -> &[u8] {
        &self.0
    }

    /// Returns true if the key is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the length of the key in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<Vec<u8>> for SecretKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for SecretKey {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretKey {}
