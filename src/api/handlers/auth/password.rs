//! Password reset and password change endpoints.
//!
//! A reset link carries a short-lived session token; the frontend presents it
//! as a Bearer credential to `set-password`, so both flows end in the same
//! protected handler.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{
    credentials::hash_password,
    principal::Principal,
    state::AuthState,
    types::{ForgotPasswordRequest, SetPasswordRequest},
    utils::{build_reset_url, normalize_email, valid_email},
};
use crate::api::{
    email::{EmailMessage, EmailSender, TEMPLATE_PASSWORD_RESET},
    handlers::error::{ErrorBody, error_response},
};

/// Mail a reset link (always returns 204 to avoid account enumeration).
#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 204, description = "Reset accepted"),
        (status = 400, description = "Missing payload", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    auth_state: Extension<Arc<AuthState>>,
    email_sender: Extension<Arc<dyn EmailSender>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request body");
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        debug!("forgot-password with invalid email format");
        return StatusCode::NO_CONTENT.into_response();
    }

    let lookup = tokio::time::timeout(
        auth_state.config().lookup_timeout(),
        auth_state.credentials().lookup_by_email(&email),
    )
    .await;

    let record = match lookup {
        Ok(Ok(Some(record))) => record,
        Ok(Ok(None)) => {
            info!(email = %email, "forgot-password for unknown account");
            return StatusCode::NO_CONTENT.into_response();
        }
        Ok(Err(err)) => {
            error!("Failed to lookup account for password reset: {err:#}");
            return StatusCode::NO_CONTENT.into_response();
        }
        Err(_) => {
            error!("Account lookup for password reset timed out");
            return StatusCode::NO_CONTENT.into_response();
        }
    };

    let now = auth_state.now().timestamp();
    let token =
        match auth_state
            .codec()
            .issue(&record.principal(), auth_state.config().reset_ttl(), now)
        {
            Ok(token) => token,
            Err(err) => {
                error!("Failed to issue reset token: {err}");
                return StatusCode::NO_CONTENT.into_response();
            }
        };

    let reset_url = build_reset_url(auth_state.config().app_domain(), &token);
    let message = EmailMessage {
        to_email: record.email.clone(),
        template: TEMPLATE_PASSWORD_RESET.to_string(),
        payload_json: serde_json::json!({ "reset_url": reset_url }).to_string(),
    };
    if let Err(err) = email_sender.send(&message) {
        warn!("Failed to send password reset email: {err:#}");
    }

    StatusCode::NO_CONTENT.into_response()
}

/// Replace the authenticated account's password.
#[utoipa::path(
    post,
    path = "/v1/auth/set-password",
    request_body = SetPasswordRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 400, description = "Missing or empty password", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 404, description = "Account no longer exists", body = ErrorBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "auth"
)]
pub async fn set_password(
    principal: Principal,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SetPasswordRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request body");
    };
    if request.password.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "password required");
    }

    let hashed = tokio::task::spawn_blocking(move || hash_password(&request.password)).await;
    let hash = match hashed {
        Ok(Ok(hash)) => hash,
        Ok(Err(err)) => {
            error!("Failed to hash password: {err:#}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
        Err(err) => {
            error!("Password hashing task failed: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
    };

    match auth_state
        .credentials()
        .set_password_hash(principal.id, &hash)
        .await
    {
        Ok(true) => {
            info!(account_id = principal.id, "password updated");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, "account not found"),
        Err(err) => {
            error!("Failed to store password hash: {err:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}
