//! Promotion management, entitlement and redemption.
//!
//! Membership is re-resolved from storage on every check; nothing in the
//! session token is trusted for entitlement.

pub(crate) mod entitlement;
pub(crate) mod error;
pub(crate) mod manage;
pub(crate) mod redeem;
pub(crate) mod storage;
pub(crate) mod types;

pub use entitlement::{
    DenialReason, Entitlement, EntitlementFacts, MembershipLink, PromotionScope, decide,
};
pub use error::{ManageError, RedeemError};
pub use storage::{PgPromotionStore, PromotionStore};
pub use types::{
    PermissionResponse, Promotion, PromotionRequest, PromotionSummary, RedemptionEvent,
};
