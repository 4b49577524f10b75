//! # Peragrin (Community Membership & Promotions API)
//!
//! `peragrin` serves accounts, communities, memberships and the promotions that
//! organizations offer to community members.
//!
//! ## Authentication
//!
//! Every protected request carries an `Authorization` header with one of two
//! strategies:
//!
//! - **Basic:** `base64(email:password)`, checked against an Argon2 hash.
//! - **Bearer:** an HS256 token issued by `POST /v1/auth/login` (or mailed for
//!   activation and password reset), signed with the process-wide token secret.
//!
//! A missing account and a wrong password produce the same `401` response and
//! both pay for an Argon2 verification, so neither the body nor the timing
//! reveals which emails are registered.
//!
//! ## Entitlement
//!
//! A promotion may be restricted to a set of communities and memberships. A
//! principal may redeem it only while holding a non-expired account-membership
//! link into that scope. Single-use promotions are checked and recorded in one
//! transaction so concurrent redemptions cannot both succeed.

pub mod api;
pub mod cli;
pub mod db;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
