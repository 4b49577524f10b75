//! Password login and the current-account endpoint.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info};

use super::{
    credentials::Credentials,
    error::AuthError,
    principal::Principal,
    state::AuthState,
    types::{LoginRequest, LoginResponse},
};
use crate::api::handlers::error::{ErrorBody, error_response};

/// Exchange an email and password for a signed session token.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token issued", body = LoginResponse),
        (status = 400, description = "Missing or malformed payload", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request body");
    };

    let credentials = Credentials {
        email: request.email,
        password: request.password,
    };
    let principal = match credentials
        .authenticate(
            auth_state.credentials(),
            auth_state.config().lookup_timeout(),
        )
        .await
    {
        Ok(principal) => principal,
        Err(err) => return AuthError::from(err).into_response(),
    };

    let now = auth_state.now().timestamp();
    match auth_state
        .codec()
        .issue(&principal, auth_state.config().session_ttl(), now)
    {
        Ok(token) => {
            info!(account_id = principal.id, "session token issued");
            let response = LoginResponse {
                token,
                id: principal.id,
                email: principal.email,
                is_super: principal.is_super,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            error!("Failed to issue session token: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Return the principal attached by the authentication middleware.
#[utoipa::path(
    get,
    path = "/v1/auth/account",
    responses(
        (status = 200, description = "Authenticated account", body = Principal),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "auth"
)]
pub async fn account(principal: Principal) -> Json<Principal> {
    Json(principal)
}
