//! Redemption history per account.

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

use super::{
    auth::Principal,
    error::{ErrorBody, MessageBody, error_response, message_response},
    parse_id,
    promotions::{PromotionStore, RedemptionEvent},
};

#[utoipa::path(
    get,
    path = "/v1/accounts/{id}/redemptions",
    params(("id" = i32, Path, description = "Account id")),
    responses(
        (status = 200, description = "Redemptions, newest first", body = [RedemptionEvent]),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not the account owner or a super user", body = MessageBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "accounts"
)]
pub async fn redemptions(
    principal: Principal,
    Path(raw_account_id): Path<String>,
    store: Extension<Arc<dyn PromotionStore>>,
) -> Response {
    let Some(account_id) = parse_id(&raw_account_id) else {
        return error_response(StatusCode::BAD_REQUEST, "account id required");
    };
    history(&principal, store.0.as_ref(), account_id, None).await
}

#[utoipa::path(
    get,
    path = "/v1/accounts/{id}/promotions/{promotion_id}/redemptions",
    params(
        ("id" = i32, Path, description = "Account id"),
        ("promotion_id" = i32, Path, description = "Promotion id")
    ),
    responses(
        (status = 200, description = "Redemptions of one promotion, newest first", body = [RedemptionEvent]),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not the account owner or a super user", body = MessageBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "accounts"
)]
pub async fn promotion_redemptions(
    principal: Principal,
    Path((raw_account_id, raw_promotion_id)): Path<(String, String)>,
    store: Extension<Arc<dyn PromotionStore>>,
) -> Response {
    let Some(account_id) = parse_id(&raw_account_id) else {
        return error_response(StatusCode::BAD_REQUEST, "account id required");
    };
    let Some(promotion_id) = parse_id(&raw_promotion_id) else {
        return error_response(StatusCode::BAD_REQUEST, "promotion id required");
    };
    history(&principal, store.0.as_ref(), account_id, Some(promotion_id)).await
}

async fn history(
    principal: &Principal,
    store: &dyn PromotionStore,
    account_id: i32,
    promotion_id: Option<i32>,
) -> Response {
    if principal.id != account_id && !principal.is_super {
        return message_response(StatusCode::FORBIDDEN, "not allowed");
    }
    match store.redemptions(account_id, promotion_id).await {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(err) => {
            error!("Failed to list redemptions: {err:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}
