//! Decoding of the `Authorization` header into a closed set of strategies.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use base64ct::{Base64, Encoding};

use super::{credentials::Credentials, error::AuthError};

/// Credential material presented by a request, decoded once.
#[derive(Debug)]
pub enum AuthStrategy {
    Basic(Credentials),
    Bearer(String),
    /// Any other scheme; carries the scheme name for logging.
    Unsupported(String),
}

impl AuthStrategy {
    /// Decode the request's `Authorization` header.
    ///
    /// # Errors
    /// `AuthenticationRequired` when the header is absent or empty,
    /// `BadCredentialsFormat` when a Basic payload does not decode to `email:password`.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::AuthenticationRequired)?
            .to_str()
            .map_err(|_| AuthError::BadCredentialsFormat)?
            .trim();
        if value.is_empty() {
            return Err(AuthError::AuthenticationRequired);
        }

        let (scheme, rest) = value.split_once(' ').unwrap_or((value, ""));
        let rest = rest.trim();

        if scheme.eq_ignore_ascii_case("basic") {
            return decode_basic(rest).map(Self::Basic);
        }
        if scheme.eq_ignore_ascii_case("bearer") {
            return Ok(Self::Bearer(rest.to_string()));
        }
        Ok(Self::Unsupported(scheme.to_string()))
    }
}

fn decode_basic(encoded: &str) -> Result<Credentials, AuthError> {
    let bytes = Base64::decode_vec(encoded).map_err(|_| AuthError::BadCredentialsFormat)?;
    let decoded = String::from_utf8(bytes).map_err(|_| AuthError::BadCredentialsFormat)?;
    let (email, password) = decoded
        .split_once(':')
        .ok_or(AuthError::BadCredentialsFormat)?;
    Ok(Credentials {
        email: email.to_string(),
        password: password.to_string(),
    })
}
