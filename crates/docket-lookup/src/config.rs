//! Configuration for the upstream lookup API.

use serde::{Deserialize, Serialize};
use time::Duration;

/// Configuration for the upstream data-sharing API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream API, without a trailing slash.
    pub base_url: String,

    /// Path of the login endpoint.
    pub login_path: String,

    /// Path of the company query endpoint.
    pub company_path: String,

    /// Path of the idcard query endpoint.
    pub idcard_path: String,

    /// Account used for the login call.
    pub username: String,

    /// Static (pre-encrypted) password for the login call.
    pub password: String,

    /// Hours a freshly obtained session stays valid.
    pub session_ttl_hours: i64,

    /// Days a lookup result stays cached.
    pub cache_ttl_days: i64,

    /// Per-request timeout in seconds for all upstream calls.
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            login_path: "/v1/api/login".into(),
            company_path: "/v1/api/company".into(),
            idcard_path: "/v1/api/idcard".into(),
            username: String::new(),
            password: String::new(),
            session_ttl_hours: 10,
            cache_ttl_days: 30,
            request_timeout_secs: 30,
        }
    }
}

impl UpstreamConfig {
    /// Creates a configuration for the given base URL and account.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Sets the session TTL in hours.
    #[must_use]
    pub fn with_session_ttl_hours(mut self, hours: i64) -> Self {
        self.session_ttl_hours = hours;
        self
    }

    /// Sets the cache TTL in days.
    #[must_use]
    pub fn with_cache_ttl_days(mut self, days: i64) -> Self {
        self.cache_ttl_days = days;
        self
    }

    /// Session TTL as a duration.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_ttl_hours)
    }

    /// Cache TTL as a duration.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::days(self.cache_ttl_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upstream_contract() {
        let config = UpstreamConfig::default();
        assert_eq!(config.session_ttl_hours, 10);
        assert_eq!(config.cache_ttl_days, 30);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn ttl_conversions() {
        let config = UpstreamConfig::default()
            .with_session_ttl_hours(2)
            .with_cache_ttl_days(7);
        assert_eq!(config.session_ttl(), Duration::hours(2));
        assert_eq!(config.cache_ttl(), Duration::days(7));
    }
}
