//! Authentication middleware.
//!
//! Flow Overview: decode the `Authorization` header once into an
//! [`AuthStrategy`], resolve it through the token codec (Bearer) or the
//! credential store and verifier (Basic), then attach the principal to the
//! current request's extensions before the handler runs. Every failure is
//! returned immediately; the caller must resubmit.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, info};

use super::{error::AuthError, principal::Principal, state::AuthState, strategy::AuthStrategy};

/// Resolve a request's credentials into a principal.
///
/// # Errors
/// See [`AuthError`]; every variant is terminal for the request.
pub async fn authenticate(
    auth_state: &AuthState,
    headers: &HeaderMap,
) -> Result<Principal, AuthError> {
    match AuthStrategy::from_headers(headers)? {
        AuthStrategy::Bearer(token) => {
            let now = auth_state.now().timestamp();
            auth_state.codec().parse(&token, now).map_err(|err| {
                info!("Bearer authentication failed: {err}");
                AuthError::Bearer(err)
            })
        }
        AuthStrategy::Basic(credentials) => Ok(credentials
            .authenticate(
                auth_state.credentials(),
                auth_state.config().lookup_timeout(),
            )
            .await?),
        AuthStrategy::Unsupported(scheme) => {
            debug!(scheme = %scheme, "unsupported authentication scheme");
            Err(AuthError::UnsupportedStrategy)
        }
    }
}

/// `axum` middleware guarding protected routes.
pub async fn require_auth(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&auth_state, request.headers()).await {
        Ok(principal) => {
            debug!(account_id = principal.id, "request authenticated");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}
