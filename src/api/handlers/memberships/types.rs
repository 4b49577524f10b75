//! Request/response types for membership endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GrantMembershipRequest {
    pub email: String,
    /// Omitted or `null` for a link that never expires.
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GrantMembershipResponse {
    pub account_id: i32,
    pub membership_id: i32,
    pub email: String,
    pub expiration: Option<DateTime<Utc>>,
    pub created: bool,
}

/// Body of `PUT /v1/memberships/{id}/accounts/{account_id}`.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UpdateMembershipRequest {
    /// Omitted or `null` to make the link permanent.
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

/// An account linked to a membership tier.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MembershipAccount {
    pub account_id: i32,
    pub email: String,
    pub expiration: Option<DateTime<Utc>>,
}
