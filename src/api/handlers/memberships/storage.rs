//! Account-membership link persistence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::types::MembershipAccount;
use crate::api::handlers::auth::Principal;

/// Result of granting a membership to an email address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantOutcome {
    pub account: Principal,
    /// `true` when the account did not exist and was created by this grant.
    pub created: bool,
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Find or create the account, then create or refresh its link.
    /// `Ok(None)` when the membership does not exist.
    async fn grant(
        &self,
        membership_id: i32,
        email: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<GrantOutcome>>;

    /// Remove a link; `false` when there was nothing to remove.
    async fn revoke(&self, membership_id: i32, account_id: i32) -> Result<bool>;

    /// Linked accounts ordered by id, expired links included.
    /// `Ok(None)` when the membership does not exist.
    async fn accounts(&self, membership_id: i32) -> Result<Option<Vec<MembershipAccount>>>;

    /// Change an existing link's expiration; `Ok(None)` when there is no such link.
    async fn update_expiration(
        &self,
        membership_id: i32,
        account_id: i32,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<MembershipAccount>>;
}

#[derive(Clone, Debug)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    async fn grant(
        &self,
        membership_id: i32,
        email: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<GrantOutcome>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin grant transaction")?;

        let query = "SELECT id FROM memberships WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let membership = sqlx::query(query)
            .bind(membership_id)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to load membership")?;
        if membership.is_none() {
            return Ok(None);
        }

        // A concurrent grant for the same new email turns this insert into a
        // no-op; the select below then sees the committed row.
        let query = r"
            INSERT INTO accounts (email)
            VALUES ($1)
            ON CONFLICT ((LOWER(email))) DO NOTHING
            RETURNING id, email, is_super
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let inserted = sqlx::query(query)
            .bind(email)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to create account")?;

        let (row, created) = if let Some(row) = inserted {
            (row, true)
        } else {
            let query = "SELECT id, email, is_super FROM accounts WHERE LOWER(email) = LOWER($1)";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = query
            );
            let row = sqlx::query(query)
                .bind(email)
                .fetch_one(&mut *tx)
                .instrument(span)
                .await
                .context("failed to load account")?;
            (row, false)
        };
        let account = Principal {
            id: row.get("id"),
            email: row.get("email"),
            is_super: row.get("is_super"),
        };

        let query = r"
            INSERT INTO account_memberships (account_id, membership_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id, membership_id)
            DO UPDATE SET expires_at = EXCLUDED.expires_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account.id)
            .bind(membership_id)
            .bind(expires_at)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to upsert membership link")?;

        tx.commit()
            .await
            .context("failed to commit grant transaction")?;

        Ok(Some(GrantOutcome { account, created }))
    }

    async fn revoke(&self, membership_id: i32, account_id: i32) -> Result<bool> {
        let query = "DELETE FROM account_memberships WHERE membership_id = $1 AND account_id = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(membership_id)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to revoke membership link")?;

        Ok(result.rows_affected() > 0)
    }

    async fn accounts(&self, membership_id: i32) -> Result<Option<Vec<MembershipAccount>>> {
        let query = "SELECT id FROM memberships WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let membership = sqlx::query(query)
            .bind(membership_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load membership")?;
        if membership.is_none() {
            return Ok(None);
        }

        let query = r"
            SELECT a.id, a.email, am.expires_at
            FROM account_memberships am
            JOIN accounts a ON a.id = am.account_id
            WHERE am.membership_id = $1
            ORDER BY a.id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(membership_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list membership accounts")?;

        Ok(Some(
            rows.into_iter()
                .map(|row| MembershipAccount {
                    account_id: row.get("id"),
                    email: row.get("email"),
                    expiration: row.get("expires_at"),
                })
                .collect(),
        ))
    }

    async fn update_expiration(
        &self,
        membership_id: i32,
        account_id: i32,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<MembershipAccount>> {
        let query = r"
            UPDATE account_memberships am
            SET expires_at = $3
            FROM accounts a
            WHERE am.membership_id = $1 AND am.account_id = $2 AND a.id = am.account_id
            RETURNING a.id, a.email, am.expires_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(membership_id)
            .bind(account_id)
            .bind(expires_at)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to update membership link")?;

        Ok(row.map(|row| MembershipAccount {
            account_id: row.get("id"),
            email: row.get("email"),
            expiration: row.get("expires_at"),
        }))
    }
}
