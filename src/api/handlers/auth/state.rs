//! Auth state and configuration.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use std::sync::Arc;

use super::{storage::CredentialStore, token::TokenCodec};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_RESET_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_ACTIVATION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_LOOKUP_TIMEOUT_SECONDS: u64 = 5;

/// Upper bound for any token TTL (one year). Larger values are clamped.
pub const MAX_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

fn bounded_ttl(seconds: i64) -> i64 {
    seconds.clamp(1, MAX_TTL_SECONDS)
}

/// Source of "now" for token expiry and membership expiration checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_secret: SecretString,
    app_domain: String,
    session_ttl_seconds: i64,
    reset_ttl_seconds: i64,
    activation_ttl_seconds: i64,
    lookup_timeout_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(token_secret: SecretString, app_domain: String) -> Self {
        Self {
            token_secret,
            app_domain,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            reset_ttl_seconds: DEFAULT_RESET_TTL_SECONDS,
            activation_ttl_seconds: DEFAULT_ACTIVATION_TTL_SECONDS,
            lookup_timeout_seconds: DEFAULT_LOOKUP_TIMEOUT_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = bounded_ttl(seconds);
        self
    }

    #[must_use]
    pub fn with_reset_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_ttl_seconds = bounded_ttl(seconds);
        self
    }

    #[must_use]
    pub fn with_activation_ttl_seconds(mut self, seconds: i64) -> Self {
        self.activation_ttl_seconds = bounded_ttl(seconds);
        self
    }

    #[must_use]
    pub fn with_lookup_timeout_seconds(mut self, seconds: u64) -> Self {
        self.lookup_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn app_domain(&self) -> &str {
        &self.app_domain
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn reset_ttl(&self) -> Duration {
        Duration::seconds(self.reset_ttl_seconds)
    }

    #[must_use]
    pub fn activation_ttl(&self) -> Duration {
        Duration::seconds(self.activation_ttl_seconds)
    }

    #[must_use]
    pub fn lookup_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.lookup_timeout_seconds)
    }
}

/// Everything the authentication middleware and auth handlers need, built
/// once at startup and shared read-only across requests.
pub struct AuthState {
    config: AuthConfig,
    codec: TokenCodec,
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let codec = TokenCodec::new(&config.token_secret);
        Self {
            config,
            codec,
            credentials,
            clock,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn credentials(&self) -> &dyn CredentialStore {
        self.credentials.as_ref()
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new(
            SecretString::from("secret".to_string()),
            "https://peragrin.com".to_string(),
        );

        assert_eq!(config.app_domain(), "https://peragrin.com");
        assert_eq!(config.session_ttl(), Duration::hours(24));
        assert_eq!(config.reset_ttl(), Duration::hours(24));
        assert_eq!(config.activation_ttl(), Duration::days(7));
        assert_eq!(config.lookup_timeout(), std::time::Duration::from_secs(5));

        let config = config
            .with_session_ttl_seconds(60)
            .with_reset_ttl_seconds(120)
            .with_activation_ttl_seconds(180)
            .with_lookup_timeout_seconds(1);

        assert_eq!(config.session_ttl(), Duration::seconds(60));
        assert_eq!(config.reset_ttl(), Duration::seconds(120));
        assert_eq!(config.activation_ttl(), Duration::seconds(180));
        assert_eq!(config.lookup_timeout(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn oversized_ttls_are_clamped() {
        let config = AuthConfig::new(
            SecretString::from("secret".to_string()),
            "https://peragrin.com".to_string(),
        )
        .with_session_ttl_seconds(i64::MAX)
        .with_reset_ttl_seconds(i64::MAX / 1000 + 1)
        .with_activation_ttl_seconds(0);

        assert_eq!(config.session_ttl(), Duration::seconds(MAX_TTL_SECONDS));
        assert_eq!(config.reset_ttl(), Duration::seconds(MAX_TTL_SECONDS));
        assert_eq!(config.activation_ttl(), Duration::seconds(1));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = AuthConfig::new(
            SecretString::from("super-secret-value".to_string()),
            "https://peragrin.com".to_string(),
        );
        assert!(!format!("{config:?}").contains("super-secret-value"));
    }
}
