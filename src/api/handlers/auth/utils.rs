//! Small helpers for auth validation and email links.

use regex::Regex;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Link mailed for a password reset; the frontend posts the token back as a
/// bearer credential.
pub(crate) fn build_reset_url(app_domain: &str, token: &str) -> String {
    let base = app_domain.trim_end_matches('/');
    format!("{base}/#/auth/set-password?token={token}")
}

/// Link mailed to accounts created by a membership grant.
pub(crate) fn build_activation_url(app_domain: &str, token: &str) -> String {
    let base = app_domain.trim_end_matches('/');
    format!("{base}/#/auth/activate?token={token}")
}
