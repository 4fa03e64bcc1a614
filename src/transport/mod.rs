//! Carriers for the session token between client and server.
//!
//! Transports operate on [`http::HeaderMap`] so they work with any framework
//! built on the `http` crate.

mod cookies;
mod header;

pub use cookies::CookieTransport;
pub use header::{DEFAULT_TOKEN_HEADER, HeaderTransport};
use http::HeaderMap;

use crate::{SessionError, SessionOptions};

/// Reads and writes session tokens.
///
/// A missing token is `None`, never an error, so callers can tell "no
/// session yet" apart from a token that fails to decode.
pub trait TokenTransport: Send + Sync {
    /// Returns the token for `name` carried by the request, if any.
    fn get_token(&self, request: &HeaderMap, name: &str) -> Option<String>;

    /// Writes `token` for `name` to the response.
    ///
    /// When `options.max_age` is negative the transport must instruct the
    /// client to discard any token it holds for `name`.
    fn set_token(
        &self,
        response: &mut HeaderMap,
        name: &str,
        token: &str,
        options: &SessionOptions,
    ) -> Result<(), SessionError>;
}
