//! Password hashing and credential verification.
//!
//! Hashes are Argon2id PHC strings with a random salt per password. Verification
//! fails closed: an unparsable hash, a missing hash, or any internal error all
//! count as a wrong password. Unknown accounts and accounts without a password
//! are verified against a stand-in hash so every failure costs one Argon2 run.

use anyhow::{Context, Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::{principal::Principal, storage::CredentialStore, utils::normalize_email};

/// Internal outcome of a credential check. `AccountNotFound` and
/// `InvalidPassword` are kept apart for logs and collapse into one generic
/// error at the HTTP boundary.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("account not found")]
    AccountNotFound,
    #[error("invalid credentials")]
    InvalidPassword,
    #[error("credential lookup failed")]
    Store(#[source] anyhow::Error),
}

#[derive(ToSchema, Serialize, Deserialize, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Stand-in hash verified when the account is unknown or has no password, so
/// every failed Basic or login attempt pays the same Argon2 cost.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("peragrin-unknown-account").ok());

/// Verify `plaintext` against `hash`, or against [`DUMMY_HASH`] when there is
/// no hash. Only a real hash can succeed.
fn check_password(hash: Option<&str>, plaintext: &str) -> bool {
    match hash {
        Some(hash) => verify_password(hash, plaintext),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(dummy, plaintext);
            }
            false
        }
    }
}

/// Produce a salted Argon2id hash for a new or changed password.
///
/// # Errors
/// Returns an error if the hasher rejects its parameters.
pub fn hash_password(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Constant-time comparison of `plaintext` against a stored PHC hash.
#[must_use]
pub fn verify_password(hash: &str, plaintext: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

impl Credentials {
    /// Look the account up by email and verify the password.
    ///
    /// The store lookup is bounded by `lookup_timeout`; an elapsed deadline is
    /// reported as a store failure.
    ///
    /// # Errors
    /// See [`CredentialError`].
    pub async fn authenticate(
        &self,
        store: &dyn CredentialStore,
        lookup_timeout: Duration,
    ) -> Result<Principal, CredentialError> {
        let email = normalize_email(&self.email);

        let record = tokio::time::timeout(lookup_timeout, store.lookup_by_email(&email))
            .await
            .context("credential lookup deadline exceeded")
            .map_err(CredentialError::Store)?
            .map_err(CredentialError::Store)?;

        // Argon2 is CPU bound; keep it off the async workers.
        let hash = record
            .as_ref()
            .and_then(|record| record.password_hash.clone());
        let password = self.password.clone();
        let verified =
            tokio::task::spawn_blocking(move || check_password(hash.as_deref(), &password))
                .await
                .unwrap_or(false);

        let Some(record) = record else {
            info!(email = %email, "account not found");
            return Err(CredentialError::AccountNotFound);
        };

        if !verified {
            info!(email = %email, "invalid credentials");
            return Err(CredentialError::InvalidPassword);
        }

        debug!(account_id = record.id, "credentials verified");
        Ok(record.principal())
    }
}
