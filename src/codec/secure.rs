use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::CodecError;
use crate::config::{DEFAULT_MAX_AGE, DEFAULT_MAX_TOKEN_LENGTH, MIN_HASH_KEY_LENGTH};
use crate::{SecretKey, SessionError};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;

/// A hash key for authentication and an optional block key for encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    hash_key: SecretKey,
    block_key: Option<SecretKey>,
}

impl KeyPair {
    /// Signing-only pair. Token contents are readable by the client.
    pub fn new(hash_key: impl AsRef<[u8]>) -> Self {
        Self {
            hash_key: SecretKey::new(hash_key),
            block_key: None,
        }
    }

    /// Signing and encrypting pair. The block key must be 32 bytes.
    pub fn with_encryption(hash_key: impl AsRef<[u8]>, block_key: impl AsRef<[u8]>) -> Self {
        Self {
            hash_key: SecretKey::new(hash_key),
            block_key: Some(SecretKey::new(block_key)),
        }
    }

    /// Builds a pair from hex encoded keys.
    ///
    /// Returns `None` if either key is not valid hex.
    pub fn from_hex(hash_key: &str, block_key: Option<&str>) -> Option<Self> {
        let hash_key = SecretKey::from_hex(hash_key)?;
        let block_key = match block_key {
            Some(hex_str) => Some(SecretKey::from_hex(hex_str)?),
            None => None,
        };
        Some(Self {
            hash_key,
            block_key,
        })
    }

    pub fn hash_key(&self) -> &SecretKey {
        &self.hash_key
    }

    pub fn block_key(&self) -> Option<&SecretKey> {
        self.block_key.as_ref()
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.hash_key.len() < MIN_HASH_KEY_LENGTH {
            return Err("hash key should be at least 32 bytes");
        }
        if self.block_key.as_ref().is_some_and(|key| key.len() != 32) {
            return Err("block key must be exactly 32 bytes");
        }
        Ok(())
    }
}

/// Encodes and decodes tokens with a single [`KeyPair`].
///
/// Token layout, before the outer base64: `timestamp|body|tag`, where `body`
/// is the base64 of the (optionally encrypted) value and `tag` is the raw
/// HMAC-SHA256 of `name|timestamp|body`.
#[derive(Clone)]
pub struct SecureCodec {
    hash_key: SecretKey,
    cipher: Option<Aes256Gcm>,
    max_age: i64,
    max_length: usize,
}

impl fmt::Debug for SecureCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCodec")
            .field("hash_key", &self.hash_key)
            .field("encrypted", &self.cipher.is_some())
            .field("max_age", &self.max_age)
            .field("max_length", &self.max_length)
            .finish()
    }
}

impl SecureCodec {
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if the block key is not a
    /// valid AES-256 key.
    pub fn new(pair: &KeyPair) -> Result<Self, SessionError> {
        let cipher = pair
            .block_key
            .as_ref()
            .map(|key| {
                Aes256Gcm::new_from_slice(key.expose_secret()).map_err(|_| {
                    SessionError::Configuration("block key must be exactly 32 bytes".to_owned())
                })
            })
            .transpose()?;

        Ok(Self {
            hash_key: pair.hash_key.clone(),
            cipher,
            max_age: DEFAULT_MAX_AGE,
            max_length: DEFAULT_MAX_TOKEN_LENGTH,
        })
    }

    /// Sets the maximum token age in seconds. Zero or less disables the check.
    pub fn set_max_age(&mut self, secs: i64) {
        self.max_age = secs.max(0);
    }

    pub fn max_age(&self) -> i64 {
        self.max_age
    }

    pub fn set_max_length(&mut self, len: usize) {
        self.max_length = len;
    }

    pub(crate) fn clone_limits_from(&mut self, other: &SecureCodec) {
        self.max_age = other.max_age;
        self.max_length = other.max_length;
    }

    pub fn is_encrypting(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn encode(&self, name: &str, value: &[u8]) -> Result<String, CodecError> {
        self.encode_at(name, value, Utc::now().timestamp())
    }

    pub fn decode(&self, name: &str, token: &str) -> Result<Vec<u8>, CodecError> {
        self.decode_at(name, token, Utc::now().timestamp())
    }

    pub(crate) fn encode_at(
        &self,
        name: &str,
        value: &[u8],
        now: i64,
    ) -> Result<String, CodecError> {
        let body = match &self.cipher {
            Some(cipher) => encrypt(cipher, value)?,
            None => value.to_vec(),
        };
        let body = URL_SAFE_NO_PAD.encode(body);
        let timestamp = now.to_string();
        let tag = self
            .mac(name, timestamp.as_bytes(), body.as_bytes())
            .finalize()
            .into_bytes();

        let mut raw = Vec::with_capacity(timestamp.len() + body.len() + tag.len() + 2);
        raw.extend_from_slice(timestamp.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(body.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(&tag);

        let token = URL_SAFE_NO_PAD.encode(raw);
        if token.len() > self.max_length {
            return Err(CodecError::TooLong);
        }
        Ok(token)
    }

    pub(crate) fn decode_at(
        &self,
        name: &str,
        token: &str,
        now: i64,
    ) -> Result<Vec<u8>, CodecError> {
        if token.len() > self.max_length {
            return Err(CodecError::TooLong);
        }
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| CodecError::Malformed)?;

        // The tag is raw bytes and may itself contain '|'.
        let mut parts = raw.splitn(3, |b| *b == b'|');
        let (Some(timestamp), Some(body), Some(tag)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CodecError::Malformed);
        };

        self.mac(name, timestamp, body)
            .verify_slice(tag)
            .map_err(|_| CodecError::InvalidMac)?;

        let timestamp: i64 = std::str::from_utf8(timestamp)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(CodecError::Malformed)?;
        if self.max_age > 0 && timestamp < now.saturating_sub(self.max_age) {
            return Err(CodecError::Expired);
        }

        let body = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| CodecError::Malformed)?;
        match &self.cipher {
            Some(cipher) => decrypt(cipher, &body),
            None => Ok(body),
        }
    }

    fn mac(&self, name: &str, timestamp: &[u8], body: &[u8]) -> HmacSha256 {
        // SAFETY: HMAC accepts keys of any length, so this cannot fail.
        #[allow(clippy::expect_used)]
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.hash_key.expose_secret())
            .expect("HMAC accepts keys of any size");
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(timestamp);
        mac.update(b"|");
        mac.update(body);
        mac
    }
}

/// Returns `nonce || ciphertext`.
fn encrypt(cipher: &Aes256Gcm, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CodecError::Encryption)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn decrypt(cipher: &Aes256Gcm, sealed: &[u8]) -> Result<Vec<u8>, CodecError> {
    if sealed.len() < NONCE_LEN {
        return Err(CodecError::Decryption);
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CodecError::Decryption)
}
