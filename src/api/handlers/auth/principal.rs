//! Authenticated principal and its request extractor.
//!
//! The authentication middleware inserts a `Principal` into the extensions of
//! the single request it authenticated. Handlers take `Principal` as a typed
//! argument; a route that is not behind the middleware rejects with 401.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::AuthError;

/// Public fields of an account. The password hash never lives here.
#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: i32,
    pub email: String,
    pub is_super: bool,
}

/// Stored identity returned by the credential store.
#[derive(Clone)]
pub struct CredentialRecord {
    pub id: i32,
    pub email: String,
    pub is_super: bool,
    /// `None` for invited accounts that never set a password.
    pub password_hash: Option<String>,
}

impl CredentialRecord {
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            email: self.email.clone(),
            is_super: self.is_super,
        }
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("is_super", &self.is_super)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::AuthenticationRequired)
    }
}
