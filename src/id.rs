//! Object-id style session identifiers.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::SessionError;

/// Number of hex characters in a rendered identifier.
pub const SESSION_ID_HEX_LEN: usize = 24;

/// Twelve byte session identifier, rendered as 24 lowercase hex characters.
///
/// Layout: 4-byte big-endian creation time in seconds, 5 bytes of
/// per-process randomness, 3-byte counter seeded randomly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId([u8; 12]);

fn process_unique() -> &'static [u8; 5] {
    static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
    PROCESS_UNIQUE.get_or_init(|| rand::thread_rng().r#gen())
}

fn next_counter() -> u32 {
    static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
    COUNTER
        .get_or_init(|| AtomicU32::new(rand::thread_rng().gen_range(0..0x00ff_ffff)))
        .fetch_add(1, Ordering::Relaxed)
        & 0x00ff_ffff
}

impl SessionId {
    /// Generates a new identifier.
    #[must_use]
    pub fn generate() -> Self {
        // Truncation to 32 bits wraps in 2106, same as every object id.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let secs = Utc::now().timestamp() as u32;
        let counter = next_counter().to_be_bytes();

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(process_unique());
        bytes[9..].copy_from_slice(&counter[1..]);
        Self(bytes)
    }

    /// Parses a 24 character hex identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidIdentifier`] for anything else.
    pub fn parse(s: &str) -> Result<Self, SessionError> {
        if s.len() != SESSION_ID_HEX_LEN {
            return Err(SessionError::InvalidIdentifier);
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| SessionError::InvalidIdentifier)?;
        Ok(Self(bytes))
    }

    /// Returns the creation time embedded in the identifier.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let secs = u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]);
        DateTime::from_timestamp(i64::from(secs), 0)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Returns the lowercase hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.to_hex())
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SessionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generate_format() {
        let id = SessionId::generate();
        let hex = id.to_string();
        assert_eq!(hex.len(), SESSION_ID_HEX_LEN);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generate_unique() {
        let ids: HashSet<SessionId> = (0..1000).map(|_| SessionId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = SessionId::generate();
        let parsed = SessionId::parse(&id.to_hex()).unwrap();
        assert_eq!(parsed, id);

        let from_str: SessionId = "507f1f77bcf86cd799439011".parse().unwrap();
        assert_eq!(from_str.to_string(), "507f1f77bcf86cd799439011");
    }

    #[test]
    fn test_parse_accepts_uppercase() {
        let id = SessionId::parse("507F1F77BCF86CD799439011").unwrap();
        assert_eq!(id.to_string(), "507f1f77bcf86cd799439011");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        for input in [
            "",
            "abc",
            "507f1f77bcf86cd79943901",
            "507f1f77bcf86cd7994390111",
            "507f1f77bcf86cd79943901g",
            "../../../../etc/passwd00",
        ] {
            assert_eq!(
                SessionId::parse(input),
                Err(SessionError::InvalidIdentifier),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_timestamp() {
        let before = Utc::now().timestamp();
        let id = SessionId::generate();
        let ts = id.timestamp().unwrap().timestamp();
        assert!(ts >= before && ts <= Utc::now().timestamp());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let id = SessionId::parse("507f1f77bcf86cd799439011").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"507f1f77bcf86cd799439011\"");

        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<SessionId>("\"nope\"").is_err());
    }
}
