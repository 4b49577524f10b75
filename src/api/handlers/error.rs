//! JSON error bodies shared by all handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `{"error": "..."}` for malformed, unauthenticated and internal failures.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

/// `{"msg": "..."}` for user-facing refusals once the caller is authenticated.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageBody {
    pub msg: String,
}

pub fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

pub fn message_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(MessageBody {
            msg: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn error_response_has_error_field() -> Result<()> {
        let response = error_response(StatusCode::UNAUTHORIZED, "authentication required");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body: ErrorBody = serde_json::from_slice(&bytes)?;
        assert_eq!(body.error, "authentication required");
        Ok(())
    }

    #[tokio::test]
    async fn message_response_has_msg_field() -> Result<()> {
        let response = message_response(StatusCode::FORBIDDEN, "nope");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(value, serde_json::json!({"msg": "nope"}));
        Ok(())
    }
}
