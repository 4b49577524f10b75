//! Entitlement decision for a (principal, promotion) pair.
//!
//! The decision is a pure function over facts loaded by a store, so the
//! Postgres and in-memory stores share one policy:
//!
//! 1. A promotion past its expiration is never redeemable.
//! 2. An empty scope (no communities, no memberships) admits any principal.
//! 3. Otherwise at least one of the principal's *active* membership links must
//!    point at a scoped membership, or at a membership whose community is scoped.
//!    A link whose expiration is at or before `now` does not count.
//! 4. A single-use promotion with a prior redemption by this principal is refused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Restriction set attached to a promotion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromotionScope {
    pub communities: Vec<i32>,
    pub memberships: Vec<i32>,
}

impl PromotionScope {
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.communities.is_empty() && self.memberships.is_empty()
    }

    fn admits(&self, link: &MembershipLink) -> bool {
        self.memberships.contains(&link.membership_id)
            || self.communities.contains(&link.community_id)
    }
}

/// One account-membership link resolved through its membership's community.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MembershipLink {
    pub membership_id: i32,
    pub community_id: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

impl MembershipLink {
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// Everything the decision reads, captured at one point in time.
#[derive(Clone, Debug)]
pub struct EntitlementFacts {
    pub promotion_expires_at: Option<DateTime<Utc>>,
    pub single_use: bool,
    pub scope: PromotionScope,
    pub links: Vec<MembershipLink>,
    pub prior_redemptions: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum DenialReason {
    Expired,
    MembershipRequired,
    AlreadyRedeemed,
}

impl DenialReason {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Expired => "promotion expired",
            Self::MembershipRequired => "promotion membership requirement not met",
            Self::AlreadyRedeemed => "promotion already redeemed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entitlement {
    Allowed,
    Denied(DenialReason),
}

impl Entitlement {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        self == Self::Allowed
    }
}

#[must_use]
pub fn decide(facts: &EntitlementFacts, now: DateTime<Utc>) -> Entitlement {
    if facts
        .promotion_expires_at
        .is_some_and(|expires_at| expires_at <= now)
    {
        return Entitlement::Denied(DenialReason::Expired);
    }

    let member = facts.scope.is_unrestricted()
        || facts
            .links
            .iter()
            .any(|link| link.is_active(now) && facts.scope.admits(link));
    if !member {
        return Entitlement::Denied(DenialReason::MembershipRequired);
    }

    if facts.single_use && facts.prior_redemptions > 0 {
        return Entitlement::Denied(DenialReason::AlreadyRedeemed);
    }

    Entitlement::Allowed
}
