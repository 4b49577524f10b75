//! Signed session tokens (HS256).
//!
//! A token embeds the principal's public fields and an `exp` claim. Expiration
//! is compared in whole epoch seconds against an injected clock; a token whose
//! `exp` equals the current second is already expired.

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::principal::Principal;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid token ttl")]
    InvalidTtl,
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Wire payload: `{exp, id, email, isSuper}`. No password hash, no memberships.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub exp: i64,
    #[serde(flatten)]
    pub principal: Principal,
}

/// Issues and parses tokens with a process-wide symmetric secret.
///
/// Rotating the secret invalidates every token issued before the rotation.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();

        // Expiration is checked by `parse` against the caller's clock so the
        // boundary second is deterministic and testable.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            validation,
        }
    }

    /// Sign `principal` with `exp = now + ttl`.
    ///
    /// # Errors
    /// Returns `InvalidTtl` for a non-positive ttl, or `Signing` if encoding fails.
    pub fn issue(
        &self,
        principal: &Principal,
        ttl: Duration,
        now_unix_seconds: i64,
    ) -> Result<String, TokenError> {
        if ttl <= Duration::zero() {
            return Err(TokenError::InvalidTtl);
        }
        let claims = TokenClaims {
            exp: now_unix_seconds.saturating_add(ttl.num_seconds()),
            principal: principal.clone(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Verify the signature and expiration, returning the embedded principal.
    ///
    /// # Errors
    /// `InvalidSignature` when signed with another secret, `Expired` once
    /// `now >= exp`, `Malformed` for anything that is not a well-formed token.
    pub fn parse(&self, token: &str, now_unix_seconds: i64) -> Result<Principal, TokenError> {
        let data =
            jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
                .map_err(|err| match err.kind() {
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        TokenError::InvalidSignature
                    }
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                })?;

        if data.claims.exp <= now_unix_seconds {
            return Err(TokenError::Expired);
        }

        Ok(data.claims.principal)
    }
}
