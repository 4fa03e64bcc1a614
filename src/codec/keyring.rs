use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{CodecError, KeyPair, SecureCodec};
use crate::SessionError;

/// Ordered set of codecs supporting key rotation.
///
/// Codecs are kept newest first. Encoding always uses the first codec;
/// decoding tries every codec in order and returns the first success, so
/// tokens issued under an older pair stay valid for as long as that pair is
/// in the ring.
#[derive(Debug, Clone)]
pub struct KeyRing {
    codecs: Vec<SecureCodec>,
}

impl KeyRing {
    /// Builds a ring from key pairs ordered newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if `pairs` is empty or a
    /// block key is unusable.
    pub fn from_pairs(pairs: &[KeyPair]) -> Result<Self, SessionError> {
        if pairs.is_empty() {
            return Err(SessionError::Configuration(
                "at least one key pair is required".to_owned(),
            ));
        }
        let codecs = pairs
            .iter()
            .map(SecureCodec::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { codecs })
    }

    /// Adds `pair` as the newest key. Existing pairs remain valid for decoding.
    ///
    /// The new codec inherits the max-age and length limits of the ring.
    pub fn rotate(&mut self, pair: &KeyPair) -> Result<(), SessionError> {
        let mut codec = SecureCodec::new(pair)?;
        if let Some(current) = self.codecs.first() {
            codec.clone_limits_from(current);
        }
        self.codecs.insert(0, codec);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Propagates the maximum token age to every codec.
    pub fn set_max_age(&mut self, secs: i64) {
        for codec in &mut self.codecs {
            codec.set_max_age(secs);
        }
    }

    pub fn set_max_length(&mut self, len: usize) {
        for codec in &mut self.codecs {
            codec.set_max_length(len);
        }
    }

    pub fn encode(&self, name: &str, value: &[u8]) -> Result<String, CodecError> {
        self.codecs
            .first()
            .ok_or(CodecError::NoKeys)?
            .encode(name, value)
    }

    /// Tries every codec, newest first.
    ///
    /// When all fail, the reported error is the most specific one seen: an
    /// expired or undecryptable token beats a plain authentication failure.
    pub fn decode(&self, name: &str, token: &str) -> Result<Vec<u8>, CodecError> {
        let mut error = CodecError::NoKeys;
        for codec in &self.codecs {
            match codec.decode(name, token) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if error == CodecError::NoKeys || err != CodecError::InvalidMac {
                        error = err;
                    }
                }
            }
        }

        if error == CodecError::InvalidMac {
            log::warn!(target: "cellar::codec", "msg=\"token failed authentication\" name=\"{name}\" token_prefix=\"{}...\"", token.chars().take(8).collect::<String>());
        }
        Err(error)
    }

    pub fn encode_value<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<String, CodecError> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| CodecError::Serialization(e.to_string()))?;
        self.encode(name, &bytes)
    }

    pub fn decode_value<T: DeserializeOwned>(
        &self,
        name: &str,
        token: &str,
    ) -> Result<T, CodecError> {
        let bytes = self.decode(name, token)?;
        serde_json::from_slice(&bytes).map_err(|e| CodecError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::SessionValues;

    fn old_pair() -> KeyPair {
        KeyPair::new("old-hash-key-that-is-long-enough-000")
    }

    fn new_pair() -> KeyPair {
        KeyPair::with_encryption(
            "new-hash-key-that-is-long-enough-111",
            "0123456789abcdef0123456789abcdef",
        )
    }

    #[test]
    fn test_empty_ring_rejected() {
        assert!(matches!(
            KeyRing::from_pairs(&[]),
            Err(SessionError::Configuration(_))
        ));
    }

    #[test]
    fn test_identifier_roundtrip() {
        let ring = KeyRing::from_pairs(&[old_pair()]).unwrap();
        let token = ring.encode_value("sid", "507f1f77bcf86cd799439011").unwrap();
        let id: String = ring.decode_value("sid", &token).unwrap();
        assert_eq!(id, "507f1f77bcf86cd799439011");
    }

    #[test]
    fn test_values_roundtrip() {
        let ring = KeyRing::from_pairs(&[new_pair()]).unwrap();
        let mut values = SessionValues::new();
        values.insert("user".to_owned(), json!("alice"));
        values.insert("roles".to_owned(), json!(["admin", "dev"]));

        let token = ring.encode_value("sid", &values).unwrap();
        let decoded: SessionValues = ring.decode_value("sid", &token).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_rotation_keeps_old_tokens_valid() {
        let mut ring = KeyRing::from_pairs(&[old_pair()]).unwrap();
        let old_token = ring.encode_value("sid", "value").unwrap();

        ring.rotate(&new_pair()).unwrap();
        assert_eq!(ring.len(), 2);

        let decoded: String = ring.decode_value("sid", &old_token).unwrap();
        assert_eq!(decoded, "value");

        // New tokens come from the newest pair only.
        let new_token = ring.encode_value("sid", "value").unwrap();
        let old_only = KeyRing::from_pairs(&[old_pair()]).unwrap();
        assert_eq!(
            old_only.decode_value::<String>("sid", &new_token),
            Err(CodecError::InvalidMac)
        );
    }

    #[test]
    fn test_removed_pair_invalidates_tokens() {
        let ring = KeyRing::from_pairs(&[new_pair(), old_pair()]).unwrap();
        let token = KeyRing::from_pairs(&[old_pair()])
            .unwrap()
            .encode_value("sid", "value")
            .unwrap();
        assert!(ring.decode_value::<String>("sid", &token).is_ok());

        let retired = KeyRing::from_pairs(&[new_pair()]).unwrap();
        assert_eq!(
            retired.decode_value::<String>("sid", &token),
            Err(CodecError::InvalidMac)
        );
    }

    #[test]
    fn test_rotate_inherits_limits() {
        let mut ring = KeyRing::from_pairs(&[old_pair()]).unwrap();
        ring.set_max_age(60);
        ring.rotate(&new_pair()).unwrap();
        assert!(ring.codecs.iter().all(|codec| codec.max_age() == 60));
    }

    #[test]
    fn test_decode_prefers_specific_error() {
        let mut ring = KeyRing::from_pairs(&[new_pair(), old_pair()]).unwrap();
        ring.set_max_age(60);

        let codec = SecureCodec::new(&old_pair()).unwrap();
        let stale = codec
            .encode_at("sid", b"\"value\"", chrono::Utc::now().timestamp() - 120)
            .unwrap();

        assert_eq!(ring.decode("sid", &stale), Err(CodecError::Expired));
    }

    #[test]
    fn test_wrong_shape_is_serialization_error() {
        let ring = KeyRing::from_pairs(&[old_pair()]).unwrap();
        let token = ring.encode_value("sid", &42).unwrap();
        assert!(matches!(
            ring.decode_value::<String>("sid", &token),
            Err(CodecError::Serialization(_))
        ));
    }
}
