//! Outbound email abstraction.
//!
//! Handlers build an `EmailMessage` and hand it to the configured
//! `EmailSender`. Delivery failures are logged by the caller and never fail
//! the request that triggered them. The default sender for local dev is
//! `LogEmailSender`, which logs the recipient and template and returns `Ok(())`.

use anyhow::Result;
use tracing::info;

pub const TEMPLATE_PASSWORD_RESET: &str = "password-reset";
pub const TEMPLATE_ACCOUNT_ACTIVATION: &str = "account-activation";

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    /// Template variables; may carry single-use links, so it is never logged.
    pub payload_json: String,
}

/// Email delivery abstraction.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the envelope instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            "email send stub"
        );
        Ok(())
    }
}
