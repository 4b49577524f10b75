//! Super-user endpoints that add and remove accounts from a membership tier.

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{
    storage::MembershipStore,
    types::{GrantMembershipRequest, GrantMembershipResponse},
};
use crate::api::{
    email::{EmailMessage, EmailSender, TEMPLATE_ACCOUNT_ACTIVATION},
    handlers::{
        auth::{
            AuthState, Principal,
            utils::{build_activation_url, normalize_email, valid_email},
        },
        error::{ErrorBody, MessageBody, error_response, message_response},
        parse_id,
    },
};

pub(super) const SUPER_USER_REQUIRED: &str = "super user required";

#[utoipa::path(
    post,
    path = "/v1/memberships/{id}/accounts",
    request_body = GrantMembershipRequest,
    params(("id" = i32, Path, description = "Membership id")),
    responses(
        (status = 200, description = "Existing account linked", body = GrantMembershipResponse),
        (status = 201, description = "Account created and linked", body = GrantMembershipResponse),
        (status = 400, description = "Malformed id or payload", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Caller is not a super user", body = MessageBody),
        (status = 404, description = "Unknown membership", body = ErrorBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "memberships"
)]
pub async fn grant(
    principal: Principal,
    Path(raw_id): Path<String>,
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn MembershipStore>>,
    email_sender: Extension<Arc<dyn EmailSender>>,
    payload: Option<Json<GrantMembershipRequest>>,
) -> Response {
    if !principal.is_super {
        return message_response(StatusCode::FORBIDDEN, SUPER_USER_REQUIRED);
    }
    let Some(membership_id) = parse_id(&raw_id) else {
        return error_response(StatusCode::BAD_REQUEST, "membership id required");
    };
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request body");
    };
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return error_response(StatusCode::BAD_REQUEST, "invalid email");
    }

    let outcome = match store.grant(membership_id, &email, request.expiration).await {
        Ok(Some(outcome)) => outcome,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "membership not found"),
        Err(err) => {
            error!("Failed to grant membership: {err:#}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
    };

    info!(
        membership_id,
        account_id = outcome.account.id,
        created = outcome.created,
        "membership granted"
    );

    if outcome.created {
        send_activation(&auth_state, email_sender.0.as_ref(), &outcome.account);
    }

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let response = GrantMembershipResponse {
        account_id: outcome.account.id,
        membership_id,
        email: outcome.account.email,
        expiration: request.expiration,
        created: outcome.created,
    };
    (status, Json(response)).into_response()
}

#[utoipa::path(
    delete,
    path = "/v1/memberships/{id}/accounts/{account_id}",
    params(
        ("id" = i32, Path, description = "Membership id"),
        ("account_id" = i32, Path, description = "Account id")
    ),
    responses(
        (status = 204, description = "Link removed"),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Caller is not a super user", body = MessageBody),
        (status = 404, description = "No such link", body = ErrorBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "memberships"
)]
pub async fn revoke(
    principal: Principal,
    Path((raw_membership_id, raw_account_id)): Path<(String, String)>,
    store: Extension<Arc<dyn MembershipStore>>,
) -> Response {
    if !principal.is_super {
        return message_response(StatusCode::FORBIDDEN, SUPER_USER_REQUIRED);
    }
    let (Some(membership_id), Some(account_id)) =
        (parse_id(&raw_membership_id), parse_id(&raw_account_id))
    else {
        return error_response(StatusCode::BAD_REQUEST, "membership and account id required");
    };

    match store.revoke(membership_id, account_id).await {
        Ok(true) => {
            info!(membership_id, account_id, "membership revoked");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, "membership link not found"),
        Err(err) => {
            error!("Failed to revoke membership: {err:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Mail an activation link to a freshly created account. Failures are logged only.
fn send_activation(auth_state: &AuthState, email_sender: &dyn EmailSender, account: &Principal) {
    let now = auth_state.now().timestamp();
    let token = match auth_state
        .codec()
        .issue(account, auth_state.config().activation_ttl(), now)
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to issue activation token: {err}");
            return;
        }
    };

    let activation_url = build_activation_url(auth_state.config().app_domain(), &token);
    let message = EmailMessage {
        to_email: account.email.clone(),
        template: TEMPLATE_ACCOUNT_ACTIVATION.to_string(),
        payload_json: serde_json::json!({ "activation_url": activation_url }).to_string(),
    };
    if let Err(err) = email_sender.send(&message) {
        warn!("Failed to send activation email: {err:#}");
    }
}
