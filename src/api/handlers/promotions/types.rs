//! Request/response types for promotion endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::entitlement::{DenialReason, Entitlement};

/// Immutable record that an account consumed a promotion.
#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionEvent {
    pub account_id: i32,
    pub promotion_id: i32,
    pub consumed_at: DateTime<Utc>,
}

#[derive(ToSchema, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<Entitlement> for PermissionResponse {
    fn from(entitlement: Entitlement) -> Self {
        match entitlement {
            Entitlement::Allowed => Self {
                allowed: true,
                reason: None,
            },
            Entitlement::Denied(reason) => Self {
                allowed: false,
                reason: Some(DenialReason::message(reason).to_string()),
            },
        }
    }
}

/// Body of `POST /v1/promotions` and `PUT /v1/promotions/{id}`.
///
/// Empty `communities` and `memberships` lists leave the promotion open to
/// every authenticated account.
#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRequest {
    pub organization_id: i32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exclusions: String,
    /// Omitted or `null` for a promotion that never expires.
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_single_use: bool,
    #[serde(default)]
    pub communities: Vec<i32>,
    #[serde(default)]
    pub memberships: Vec<i32>,
}

impl PromotionRequest {
    /// Trim text fields and sort and dedupe the scope ids.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.description = self.description.trim().to_string();
        self.exclusions = self.exclusions.trim().to_string();
        self.communities.sort_unstable();
        self.communities.dedup();
        self.memberships.sort_unstable();
        self.memberships.dedup();
        self
    }
}

#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: i32,
    pub organization_id: i32,
    pub name: String,
    pub description: String,
    pub exclusions: String,
    pub expiration: Option<DateTime<Utc>>,
    pub is_single_use: bool,
    pub communities: Vec<i32>,
    pub memberships: Vec<i32>,
}

impl Promotion {
    #[must_use]
    pub fn from_request(id: i32, request: PromotionRequest) -> Self {
        Self {
            id,
            organization_id: request.organization_id,
            name: request.name,
            description: request.description,
            exclusions: request.exclusions,
            expiration: request.expiration,
            is_single_use: request.is_single_use,
            communities: request.communities,
            memberships: request.memberships,
        }
    }
}

/// A promotion as listed for its organization.
#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionSummary {
    #[serde(flatten)]
    pub promotion: Promotion,
    /// Redemption events recorded across all accounts.
    pub redemptions: i64,
}
