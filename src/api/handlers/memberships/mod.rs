//! Membership tier administration.

pub(crate) mod accounts;
pub(crate) mod grant;
pub(crate) mod storage;
pub(crate) mod types;

pub use storage::{GrantOutcome, MembershipStore, PgMembershipStore};
pub use types::{
    GrantMembershipRequest, GrantMembershipResponse, MembershipAccount, UpdateMembershipRequest,
};
