//! Credential store access.
//!
//! The store is a capability: the pool serializes its own access, so callers
//! never lock around it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::principal::CredentialRecord;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Case-insensitive lookup; `Ok(None)` when no account has this email.
    async fn lookup_by_email(&self, email: &str) -> Result<Option<CredentialRecord>>;

    /// Replace the password hash; returns `false` when the account is gone.
    async fn set_password_hash(&self, account_id: i32, password_hash: &str) -> Result<bool>;
}

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<CredentialRecord>> {
        let query = r"
            SELECT id, email, is_super, password_hash
            FROM accounts
            WHERE LOWER(email) = LOWER($1)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup credentials by email")?;

        Ok(row.map(|row| CredentialRecord {
            id: row.get("id"),
            email: row.get("email"),
            is_super: row.get("is_super"),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn set_password_hash(&self, account_id: i32, password_hash: &str) -> Result<bool> {
        let query = "UPDATE accounts SET password_hash = $2 WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to set password hash")?;

        Ok(result.rows_affected() == 1)
    }
}

/// Outcome of `add-super-user`.
#[derive(Debug, PartialEq, Eq)]
pub enum SuperUserOutcome {
    Created(i32),
    Promoted(i32),
}

/// Create or promote an account to super user, optionally setting its password.
///
/// # Errors
/// Returns an error if any statement fails; the transaction is rolled back.
pub async fn upsert_super_user(
    pool: &PgPool,
    email: &str,
    password_hash: Option<&str>,
) -> Result<SuperUserOutcome> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to begin super user transaction")?;

    let query = r"
        UPDATE accounts SET is_super = TRUE
        WHERE LOWER(email) = LOWER($1)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let promoted = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to promote account")?;

    let outcome = if let Some(row) = promoted {
        SuperUserOutcome::Promoted(row.get("id"))
    } else {
        let query = r"
            INSERT INTO accounts (email, is_super)
            VALUES ($1, TRUE)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .context("failed to create super user")?;
        SuperUserOutcome::Created(row.get("id"))
    };

    if let Some(hash) = password_hash {
        let id = match outcome {
            SuperUserOutcome::Created(id) | SuperUserOutcome::Promoted(id) => id,
        };
        let query = "UPDATE accounts SET password_hash = $2 WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(hash)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to set super user password")?;
    }

    tx.commit()
        .await
        .context("failed to commit super user transaction")?;

    Ok(outcome)
}
