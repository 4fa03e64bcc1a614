use http::{HeaderMap, HeaderName, HeaderValue};

use super::TokenTransport;
use crate::{SessionError, SessionOptions};

/// Default header for [`HeaderTransport`].
pub const DEFAULT_TOKEN_HEADER: &str = "x-session-token";

/// Carries the token in a request and response header.
///
/// Suited to API clients that do not keep cookies. The header holds a single
/// token regardless of the session name; a token issued for another name
/// fails to decode. Clearing a session sends the header with an empty value.
#[derive(Debug, Clone)]
pub struct HeaderTransport {
    header: HeaderName,
}

impl HeaderTransport {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl Default for HeaderTransport {
    fn default() -> Self {
        Self::new(HeaderName::from_static(DEFAULT_TOKEN_HEADER))
    }
}

impl TokenTransport for HeaderTransport {
    fn get_token(&self, request: &HeaderMap, _name: &str) -> Option<String> {
        request
            .get(&self.header)?
            .to_str()
            .ok()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    }

    fn set_token(
        &self,
        response: &mut HeaderMap,
        _name: &str,
        token: &str,
        options: &SessionOptions,
    ) -> Result<(), SessionError> {
        let value = if options.max_age < 0 {
            HeaderValue::from_static("")
        } else {
            HeaderValue::from_str(token).map_err(|e| SessionError::Transport(e.to_string()))?
        };
        response.insert(self.header.clone(), value);
        Ok(())
    }
}
