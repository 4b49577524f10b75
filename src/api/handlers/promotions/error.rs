//! Redemption and promotion management failures and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use super::entitlement::DenialReason;
use crate::api::handlers::error::{error_response, message_response};

#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("promotion id required")]
    InvalidPromotionId,
    #[error("promotion not found")]
    PromotionNotFound,
    /// Authenticated but refused; the reason is safe to show the caller.
    #[error("{}", .0.message())]
    Denied(DenialReason),
    #[error("redemption store failure")]
    Store(#[source] anyhow::Error),
}

impl RedeemError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPromotionId => StatusCode::BAD_REQUEST,
            Self::PromotionNotFound => StatusCode::NOT_FOUND,
            Self::Denied(DenialReason::AlreadyRedeemed) => StatusCode::CONFLICT,
            Self::Denied(DenialReason::Expired | DenialReason::MembershipRequired) => {
                StatusCode::FORBIDDEN
            }
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RedeemError {
    fn into_response(self) -> Response {
        match &self {
            Self::Denied(reason) => message_response(self.status(), reason.message()),
            Self::Store(err) => {
                error!("Promotion store failure: {err:#}");
                error_response(self.status(), "internal error")
            }
            Self::InvalidPromotionId | Self::PromotionNotFound => {
                error_response(self.status(), &self.to_string())
            }
        }
    }
}

/// Failures of the super-user promotion management endpoints.
#[derive(Debug, Error)]
pub enum ManageError {
    #[error("super user required")]
    SuperUserRequired,
    #[error("promotion id required")]
    InvalidPromotionId,
    #[error("organization id required")]
    InvalidOrganizationId,
    #[error("invalid request body")]
    InvalidPayload,
    #[error("promotion name required")]
    NameRequired,
    #[error("promotion not found")]
    PromotionNotFound,
    /// The organization, a community or a membership named by the request does not exist.
    #[error("unknown organization, community or membership")]
    UnknownReference,
    #[error("promotion store failure")]
    Store(#[source] anyhow::Error),
}

impl ManageError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::SuperUserRequired => StatusCode::FORBIDDEN,
            Self::InvalidPromotionId
            | Self::InvalidOrganizationId
            | Self::InvalidPayload
            | Self::NameRequired
            | Self::UnknownReference => StatusCode::BAD_REQUEST,
            Self::PromotionNotFound => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ManageError {
    fn into_response(self) -> Response {
        match &self {
            Self::SuperUserRequired => message_response(self.status(), &self.to_string()),
            Self::Store(err) => {
                error!("Promotion store failure: {err:#}");
                error_response(self.status(), "internal error")
            }
            _ => error_response(self.status(), &self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};

    #[test]
    fn status_mapping() {
        assert_eq!(
            RedeemError::InvalidPromotionId.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RedeemError::PromotionNotFound.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RedeemError::Denied(DenialReason::MembershipRequired).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            RedeemError::Denied(DenialReason::Expired).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            RedeemError::Denied(DenialReason::AlreadyRedeemed).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            RedeemError::Store(anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn denial_uses_msg_body() -> Result<()> {
        let response = RedeemError::Denied(DenialReason::MembershipRequired).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(
            value,
            serde_json::json!({"msg": "promotion membership requirement not met"})
        );
        Ok(())
    }

    #[tokio::test]
    async fn store_failure_hides_cause() -> Result<()> {
        let response = RedeemError::Store(anyhow!("connection refused")).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(value, serde_json::json!({"error": "internal error"}));
        Ok(())
    }

    #[test]
    fn manage_status_mapping() {
        assert_eq!(
            ManageError::SuperUserRequired.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ManageError::UnknownReference.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ManageError::PromotionNotFound.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ManageError::Store(anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn manage_refusal_uses_msg_body() -> Result<()> {
        let response = ManageError::SuperUserRequired.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(value, serde_json::json!({"msg": "super user required"}));

        let response = ManageError::NameRequired.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(value, serde_json::json!({"error": "promotion name required"}));
        Ok(())
    }
}
