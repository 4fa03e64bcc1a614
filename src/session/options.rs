use crate::StoreConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    None,
    #[default]
    Lax,
    Strict,
}

/// Client-side visibility and lifetime of a session token.
///
/// Copied from the store defaults when a session is created and passed to
/// the transport unmodified on save. A negative `max_age` deletes the
/// session on the next save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub path: String,
    pub domain: Option<String>,
    /// Lifetime in seconds. Zero means a browser-session cookie.
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for SessionOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            path: config.cookie_path.clone(),
            domain: config.cookie_domain.clone(),
            max_age: config.max_age,
            secure: config.cookie_secure,
            http_only: config.cookie_http_only,
            same_site: config.cookie_same_site,
        }
    }
}

impl SessionOptions {
    /// Marks the session for deletion on the next save.
    pub fn expire(&mut self) {
        self.max_age = -1;
    }

    /// Returns true if the next save deletes the session.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.max_age < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = StoreConfig {
            cookie_domain: Some("example.com".to_owned()),
            cookie_secure: false,
            max_age: 3600,
            ..StoreConfig::default()
        };

        let options = SessionOptions::from(&config);
        assert_eq!(options.path, "/");
        assert_eq!(options.domain.as_deref(), Some("example.com"));
        assert_eq!(options.max_age, 3600);
        assert!(!options.secure);
        assert!(options.http_only);
        assert_eq!(options.same_site, SameSite::Lax);
    }

    #[test]
    fn test_expire() {
        let mut options = SessionOptions::default();
        assert!(!options.is_expired());

        options.expire();
        assert!(options.is_expired());
        assert_eq!(options.max_age, -1);
    }
}
