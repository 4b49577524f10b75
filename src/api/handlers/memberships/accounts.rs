//! Super-user views and edits of the accounts linked to a membership tier.

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info};

use super::{
    grant::SUPER_USER_REQUIRED,
    storage::MembershipStore,
    types::{MembershipAccount, UpdateMembershipRequest},
};
use crate::api::handlers::{
    auth::Principal,
    error::{ErrorBody, MessageBody, error_response, message_response},
    parse_id,
};

#[utoipa::path(
    get,
    path = "/v1/memberships/{id}/accounts",
    params(("id" = i32, Path, description = "Membership id")),
    responses(
        (status = 200, description = "Linked accounts ordered by id", body = [MembershipAccount]),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Caller is not a super user", body = MessageBody),
        (status = 404, description = "Unknown membership", body = ErrorBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "memberships"
)]
pub async fn list(
    principal: Principal,
    Path(raw_id): Path<String>,
    store: Extension<Arc<dyn MembershipStore>>,
) -> Response {
    if !principal.is_super {
        return message_response(StatusCode::FORBIDDEN, SUPER_USER_REQUIRED);
    }
    let Some(membership_id) = parse_id(&raw_id) else {
        return error_response(StatusCode::BAD_REQUEST, "membership id required");
    };

    match store.accounts(membership_id).await {
        Ok(Some(accounts)) => (StatusCode::OK, Json(accounts)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "membership not found"),
        Err(err) => {
            error!("Failed to list membership accounts: {err:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Change when an account's membership lapses.
#[utoipa::path(
    put,
    path = "/v1/memberships/{id}/accounts/{account_id}",
    request_body = UpdateMembershipRequest,
    params(
        ("id" = i32, Path, description = "Membership id"),
        ("account_id" = i32, Path, description = "Account id")
    ),
    responses(
        (status = 200, description = "Link updated", body = MembershipAccount),
        (status = 400, description = "Malformed id or payload", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Caller is not a super user", body = MessageBody),
        (status = 404, description = "No such link", body = ErrorBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "memberships"
)]
pub async fn update(
    principal: Principal,
    Path((raw_membership_id, raw_account_id)): Path<(String, String)>,
    store: Extension<Arc<dyn MembershipStore>>,
    payload: Option<Json<UpdateMembershipRequest>>,
) -> Response {
    if !principal.is_super {
        return message_response(StatusCode::FORBIDDEN, SUPER_USER_REQUIRED);
    }
    let (Some(membership_id), Some(account_id)) =
        (parse_id(&raw_membership_id), parse_id(&raw_account_id))
    else {
        return error_response(StatusCode::BAD_REQUEST, "membership and account id required");
    };
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request body");
    };

    match store
        .update_expiration(membership_id, account_id, request.expiration)
        .await
    {
        Ok(Some(account)) => {
            info!(membership_id, account_id, "membership expiration updated");
            (StatusCode::OK, Json(account)).into_response()
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "membership link not found"),
        Err(err) => {
            error!("Failed to update membership link: {err:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}
