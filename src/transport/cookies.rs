use cookie::time::{Duration, OffsetDateTime};
use cookie::{Cookie, Expiration, SameSite as CookieSameSite};
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};

use super::TokenTransport;
use crate::{SameSite, SessionError, SessionOptions};

/// Carries the token in a cookie named after the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieTransport;

impl CookieTransport {
    pub fn new() -> Self {
        Self
    }
}

fn build_cookie(name: &str, token: &str, options: &SessionOptions) -> Cookie<'static> {
    let same_site = match options.same_site {
        SameSite::None => CookieSameSite::None,
        SameSite::Lax => CookieSameSite::Lax,
        SameSite::Strict => CookieSameSite::Strict,
    };

    let mut cookie = Cookie::build((name.to_owned(), token.to_owned()))
        .path(options.path.clone())
        .secure(options.secure)
        .http_only(options.http_only)
        .same_site(same_site)
        .build();

    if let Some(ref domain) = options.domain {
        cookie.set_domain(domain.clone());
    }

    if options.max_age < 0 {
        cookie.set_value("");
        cookie.set_max_age(Duration::ZERO);
        cookie.set_expires(Expiration::DateTime(OffsetDateTime::UNIX_EPOCH));
    } else if options.max_age > 0 {
        let lifetime = Duration::seconds(options.max_age);
        cookie.set_max_age(lifetime);
        cookie.set_expires(Expiration::DateTime(OffsetDateTime::now_utc() + lifetime));
    }

    cookie
}

impl TokenTransport for CookieTransport {
    fn get_token(&self, request: &HeaderMap, name: &str) -> Option<String> {
        request
            .get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .flat_map(|header| Cookie::split_parse(header))
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == name)
            .map(|cookie| cookie.value().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn set_token(
        &self,
        response: &mut HeaderMap,
        name: &str,
        token: &str,
        options: &SessionOptions,
    ) -> Result<(), SessionError> {
        let cookie = build_cookie(name, token, options);
        let value = HeaderValue::from_str(&cookie.to_string())
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        response.append(SET_COOKIE, value);
        Ok(())
    }
}
