//! Super-user promotion management and the per-organization listing.

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::info;

use super::{
    error::ManageError,
    storage::PromotionStore,
    types::{Promotion, PromotionRequest, PromotionSummary},
};
use crate::api::handlers::{
    auth::Principal,
    error::{ErrorBody, MessageBody},
    parse_id,
};

fn require_super(principal: &Principal) -> Result<(), ManageError> {
    if principal.is_super {
        Ok(())
    } else {
        Err(ManageError::SuperUserRequired)
    }
}

fn validated(payload: Option<Json<PromotionRequest>>) -> Result<PromotionRequest, ManageError> {
    let Json(request) = payload.ok_or(ManageError::InvalidPayload)?;
    let request = request.normalized();
    if request.name.is_empty() {
        return Err(ManageError::NameRequired);
    }
    Ok(request)
}

#[utoipa::path(
    post,
    path = "/v1/promotions",
    request_body = PromotionRequest,
    responses(
        (status = 201, description = "Promotion created", body = Promotion),
        (status = 400, description = "Malformed payload or unknown reference", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Caller is not a super user", body = MessageBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "promotions"
)]
pub async fn create(
    principal: Principal,
    store: Extension<Arc<dyn PromotionStore>>,
    payload: Option<Json<PromotionRequest>>,
) -> Result<(StatusCode, Json<Promotion>), ManageError> {
    require_super(&principal)?;
    let request = validated(payload)?;

    let promotion = store.create(request).await?;
    info!(
        promotion_id = promotion.id,
        organization_id = promotion.organization_id,
        "promotion created"
    );
    Ok((StatusCode::CREATED, Json(promotion)))
}

/// Overwrite a promotion, replacing its community and membership scope.
#[utoipa::path(
    put,
    path = "/v1/promotions/{id}",
    request_body = PromotionRequest,
    params(("id" = i32, Path, description = "Promotion id")),
    responses(
        (status = 200, description = "Promotion updated", body = Promotion),
        (status = 400, description = "Malformed id or payload, unknown reference", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Caller is not a super user", body = MessageBody),
        (status = 404, description = "Unknown promotion", body = ErrorBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "promotions"
)]
pub async fn update(
    principal: Principal,
    Path(raw_id): Path<String>,
    store: Extension<Arc<dyn PromotionStore>>,
    payload: Option<Json<PromotionRequest>>,
) -> Result<Json<Promotion>, ManageError> {
    require_super(&principal)?;
    let promotion_id = parse_id(&raw_id).ok_or(ManageError::InvalidPromotionId)?;
    let request = validated(payload)?;

    let promotion = store.update(promotion_id, request).await?;
    info!(promotion_id, "promotion updated");
    Ok(Json(promotion))
}

#[utoipa::path(
    delete,
    path = "/v1/promotions/{id}",
    params(("id" = i32, Path, description = "Promotion id")),
    responses(
        (status = 204, description = "Promotion, its scope and its redemptions removed"),
        (status = 400, description = "Malformed promotion id", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Caller is not a super user", body = MessageBody),
        (status = 404, description = "Unknown promotion", body = ErrorBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "promotions"
)]
pub async fn delete(
    principal: Principal,
    Path(raw_id): Path<String>,
    store: Extension<Arc<dyn PromotionStore>>,
) -> Result<StatusCode, ManageError> {
    require_super(&principal)?;
    let promotion_id = parse_id(&raw_id).ok_or(ManageError::InvalidPromotionId)?;

    if !store.delete(promotion_id).await.map_err(ManageError::Store)? {
        return Err(ManageError::PromotionNotFound);
    }
    info!(promotion_id, "promotion deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// List an organization's promotions with how often each was redeemed.
///
/// Open to any authenticated account. An unknown organization lists nothing.
#[utoipa::path(
    get,
    path = "/v1/organizations/{id}/promotions",
    params(("id" = i32, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Promotions ordered by id", body = [PromotionSummary]),
        (status = 400, description = "Malformed organization id", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "organizations"
)]
pub async fn list_by_organization(
    _principal: Principal,
    Path(raw_id): Path<String>,
    store: Extension<Arc<dyn PromotionStore>>,
) -> Result<Json<Vec<PromotionSummary>>, ManageError> {
    let organization_id = parse_id(&raw_id).ok_or(ManageError::InvalidOrganizationId)?;
    let promotions = store
        .list_by_organization(organization_id)
        .await
        .map_err(ManageError::Store)?;
    Ok(Json(promotions))
}
