use crate::api::{self, handlers::auth::AuthConfig};
use anyhow::Result;
use secrecy::SecretString;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: SecretString,
    pub app_domain: String,
    pub session_ttl_seconds: i64,
    pub reset_ttl_seconds: i64,
    pub activation_ttl_seconds: i64,
    pub lookup_timeout_seconds: u64,
    pub request_timeout: Duration,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.token_secret.clone(), self.app_domain.clone())
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_reset_ttl_seconds(self.reset_ttl_seconds)
            .with_activation_ttl_seconds(self.activation_ttl_seconds)
            .with_lookup_timeout_seconds(self.lookup_timeout_seconds)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!(
        port = args.port,
        app_domain = %args.app_domain,
        session_ttl_seconds = args.session_ttl_seconds,
        reset_ttl_seconds = args.reset_ttl_seconds,
        activation_ttl_seconds = args.activation_ttl_seconds,
        lookup_timeout_seconds = args.lookup_timeout_seconds,
        request_timeout_seconds = args.request_timeout.as_secs(),
        "Startup configuration"
    );

    let auth_config = args.auth_config();
    api::new(args.port, args.dsn, auth_config, args.request_timeout).await
}
