use axum::{
    Json,
    extract::{Extension, Path},
};
use std::sync::Arc;
use tracing::info;

use super::{
    error::RedeemError,
    storage::PromotionStore,
    types::{PermissionResponse, RedemptionEvent},
};
use crate::api::handlers::{
    auth::{AuthState, Principal},
    error::{ErrorBody, MessageBody},
    parse_id,
};

/// Report whether the caller may redeem a promotion, without redeeming it.
#[utoipa::path(
    get,
    path = "/v1/promotions/{id}/permission",
    params(("id" = i32, Path, description = "Promotion id")),
    responses(
        (status = 200, description = "Entitlement decision", body = PermissionResponse),
        (status = 400, description = "Malformed promotion id", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 404, description = "Unknown promotion", body = ErrorBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "promotions"
)]
pub async fn permission(
    principal: Principal,
    Path(raw_id): Path<String>,
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn PromotionStore>>,
) -> Result<Json<PermissionResponse>, RedeemError> {
    let promotion_id = parse_id(&raw_id).ok_or(RedeemError::InvalidPromotionId)?;
    let entitlement = store
        .entitlement(principal.id, promotion_id, auth_state.now())
        .await
        .map_err(RedeemError::Store)?
        .ok_or(RedeemError::PromotionNotFound)?;
    Ok(Json(PermissionResponse::from(entitlement)))
}

/// Redeem a promotion for the caller.
#[utoipa::path(
    post,
    path = "/v1/promotions/{id}/redeem",
    params(("id" = i32, Path, description = "Promotion id")),
    responses(
        (status = 200, description = "Redemption recorded", body = RedemptionEvent),
        (status = 400, description = "Malformed promotion id", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not entitled or promotion expired", body = MessageBody),
        (status = 404, description = "Unknown promotion", body = ErrorBody),
        (status = 409, description = "Single-use promotion already redeemed", body = MessageBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "promotions"
)]
pub async fn redeem(
    principal: Principal,
    Path(raw_id): Path<String>,
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn PromotionStore>>,
) -> Result<Json<RedemptionEvent>, RedeemError> {
    let promotion_id = parse_id(&raw_id).ok_or(RedeemError::InvalidPromotionId)?;
    let event = store
        .redeem(principal.id, promotion_id, auth_state.now())
        .await?;
    info!(
        account_id = principal.id,
        promotion_id, "promotion redeemed"
    );
    Ok(Json(event))
}
