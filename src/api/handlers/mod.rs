//! API handlers and shared utilities for Peragrin.

pub mod accounts;
pub mod auth;
pub mod error;
pub mod health;
pub mod memberships;
pub mod promotions;

#[cfg(test)]
pub(crate) mod test_support;

/// Parse a path segment as a positive database id.
pub(crate) fn parse_id(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok().filter(|id| *id > 0)
}
