//! Tamper-evident token encoding.
//!
//! A [`SecureCodec`] turns bytes into an opaque token bound to a session name
//! and back. Tokens carry their creation time and an HMAC-SHA256 tag over
//! `name|timestamp|body`; the body is optionally sealed with AES-256-GCM.
//! A [`KeyRing`] holds several codecs for key rotation.

mod keyring;
mod secure;

use std::fmt;

pub use keyring::KeyRing;
pub use secure::{KeyPair, SecureCodec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The token is not valid base64 or lacks its timestamp, body or tag.
    Malformed,
    /// The authentication tag does not match.
    InvalidMac,
    /// The token is older than the configured max-age.
    Expired,
    /// The token exceeds the maximum length.
    TooLong,
    Encryption,
    Decryption,
    Serialization(String),
    /// The key ring has no codecs.
    NoKeys,
}

impl std::error::Error for CodecError {}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Malformed => write!(f, "Malformed token"),
            CodecError::InvalidMac => write!(f, "Token failed authentication"),
            CodecError::Expired => write!(f, "Token has expired"),
            CodecError::TooLong => write!(f, "Token exceeds maximum length"),
            CodecError::Encryption => write!(f, "Failed to encrypt token"),
            CodecError::Decryption => write!(f, "Failed to decrypt token"),
            CodecError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            CodecError::NoKeys => write!(f, "No keys configured"),
        }
    }
}
