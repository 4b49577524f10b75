//! Authentication failures and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use super::{credentials::CredentialError, token::TokenError};
use crate::api::handlers::error::error_response;

/// Terminal outcome of a rejected request. Nothing here is retried.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("basic auth: bad credentials format")]
    BadCredentialsFormat,
    /// Wraps both "account not found" and "invalid password"; the caller only
    /// ever sees the generic message.
    #[error("basic auth failed: invalid credentials")]
    InvalidCredentials,
    #[error("jwt auth failed: {0}")]
    Bearer(#[source] TokenError),
    #[error("authentication strategy not supported")]
    UnsupportedStrategy,
    #[error("credential store unavailable")]
    Store(#[source] anyhow::Error),
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::AccountNotFound | CredentialError::InvalidPassword => {
                Self::InvalidCredentials
            }
            CredentialError::Store(err) => Self::Store(err),
        }
    }
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadCredentialsFormat => StatusCode::BAD_REQUEST,
            Self::AuthenticationRequired
            | Self::InvalidCredentials
            | Self::Bearer(_)
            | Self::UnsupportedStrategy => StatusCode::UNAUTHORIZED,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Store(err) = &self {
            // The cause stays in the logs; clients get a generic message.
            error!("Authentication store failure: {err:#}");
            return error_response(self.status(), "internal error");
        }
        error_response(self.status(), &self.to_string())
    }
}
