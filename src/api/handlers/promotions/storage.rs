//! Promotion definitions, entitlement and redemption persistence.
//!
//! `create` and `update` write a promotion row and replace its
//! `promotion_communities`/`promotion_memberships` scope rows in one
//! transaction. Deleting a promotion cascades to its scope and redemptions.
//!
//! `redeem` is the only writer of redemption events. It serializes attempts for one
//! (account, promotion) pair with a transaction-scoped advisory lock, re-reads
//! the entitlement facts inside that transaction, and inserts the event before
//! committing. The partial unique index on single-use rows turns any remaining
//! race into a unique violation, reported as "already redeemed".

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row};
use tracing::{Instrument, info};

use super::{
    entitlement::{
        DenialReason, Entitlement, EntitlementFacts, MembershipLink, PromotionScope, decide,
    },
    error::{ManageError, RedeemError},
    types::{Promotion, PromotionRequest, PromotionSummary, RedemptionEvent},
};

#[async_trait]
pub trait PromotionStore: Send + Sync {
    /// Read-only decision; `Ok(None)` when the promotion does not exist.
    async fn entitlement(
        &self,
        account_id: i32,
        promotion_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>>;

    /// Check entitlement and record exactly one redemption event, atomically.
    async fn redeem(
        &self,
        account_id: i32,
        promotion_id: i32,
        now: DateTime<Utc>,
    ) -> Result<RedemptionEvent, RedeemError>;

    /// Redemption history, newest first, optionally narrowed to one promotion.
    async fn redemptions(
        &self,
        account_id: i32,
        promotion_id: Option<i32>,
    ) -> Result<Vec<RedemptionEvent>>;

    /// Insert a promotion and its scope.
    async fn create(&self, request: PromotionRequest) -> Result<Promotion, ManageError>;

    /// Overwrite a promotion and replace its scope.
    async fn update(
        &self,
        promotion_id: i32,
        request: PromotionRequest,
    ) -> Result<Promotion, ManageError>;

    /// Remove a promotion; `false` when it did not exist.
    async fn delete(&self, promotion_id: i32) -> Result<bool>;

    /// Promotions owned by an organization with their redemption counts, by id.
    async fn list_by_organization(&self, organization_id: i32) -> Result<Vec<PromotionSummary>>;
}

#[derive(Clone, Debug)]
pub struct PgPromotionStore {
    pool: PgPool,
}

impl PgPromotionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromotionStore for PgPromotionStore {
    async fn entitlement(
        &self,
        account_id: i32,
        promotion_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("failed to acquire connection")?;
        let facts = load_facts(&mut conn, account_id, promotion_id).await?;
        Ok(facts.map(|facts| decide(&facts, now)))
    }

    async fn redeem(
        &self,
        account_id: i32,
        promotion_id: i32,
        now: DateTime<Utc>,
    ) -> Result<RedemptionEvent, RedeemError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin redemption transaction")
            .map_err(RedeemError::Store)?;

        let query = "SELECT pg_advisory_xact_lock($1, $2)";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .bind(promotion_id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to lock redemption pair")
            .map_err(RedeemError::Store)?;

        let facts = load_facts(&mut tx, account_id, promotion_id)
            .await
            .map_err(RedeemError::Store)?
            .ok_or(RedeemError::PromotionNotFound)?;

        if let Entitlement::Denied(reason) = decide(&facts, now) {
            info!(account_id, promotion_id, ?reason, "redemption denied");
            return Err(RedeemError::Denied(reason));
        }

        let query = r"
            INSERT INTO account_promotions (account_id, promotion_id, consumed_at, single_use)
            VALUES ($1, $2, $3, $4)
            RETURNING consumed_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = match sqlx::query(query)
            .bind(account_id)
            .bind(promotion_id)
            .bind(now)
            .bind(facts.single_use)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
        {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => {
                info!(account_id, promotion_id, "single-use promotion already redeemed");
                return Err(RedeemError::Denied(DenialReason::AlreadyRedeemed));
            }
            Err(err) => {
                return Err(RedeemError::Store(
                    anyhow::Error::new(err).context("failed to insert redemption"),
                ));
            }
        };

        tx.commit()
            .await
            .context("failed to commit redemption")
            .map_err(RedeemError::Store)?;

        Ok(RedemptionEvent {
            account_id,
            promotion_id,
            consumed_at: row.get("consumed_at"),
        })
    }

    async fn redemptions(
        &self,
        account_id: i32,
        promotion_id: Option<i32>,
    ) -> Result<Vec<RedemptionEvent>> {
        let query = r"
            SELECT account_id, promotion_id, consumed_at
            FROM account_promotions
            WHERE account_id = $1
              AND ($2::INTEGER IS NULL OR promotion_id = $2)
            ORDER BY consumed_at DESC, id DESC
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(account_id)
            .bind(promotion_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list redemptions")?;

        Ok(rows
            .into_iter()
            .map(|row| RedemptionEvent {
                account_id: row.get("account_id"),
                promotion_id: row.get("promotion_id"),
                consumed_at: row.get("consumed_at"),
            })
            .collect())
    }

    async fn create(&self, request: PromotionRequest) -> Result<Promotion, ManageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin promotion transaction")
            .map_err(ManageError::Store)?;

        let query = r"
            INSERT INTO promotions
                (organization_id, name, description, exclusions, expires_at, is_single_use)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let promotion_id: i32 = sqlx::query(query)
            .bind(request.organization_id)
            .bind(&request.name)
            .bind(&request.description)
            .bind(&request.exclusions)
            .bind(request.expiration)
            .bind(request.is_single_use)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .map_err(|err| write_failure(err, "failed to insert promotion"))?
            .get("id");

        write_scope(&mut tx, promotion_id, &request).await?;

        tx.commit()
            .await
            .context("failed to commit promotion")
            .map_err(ManageError::Store)?;

        Ok(Promotion::from_request(promotion_id, request))
    }

    async fn update(
        &self,
        promotion_id: i32,
        request: PromotionRequest,
    ) -> Result<Promotion, ManageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin promotion transaction")
            .map_err(ManageError::Store)?;

        let query = r"
            UPDATE promotions
            SET organization_id = $2,
                name = $3,
                description = $4,
                exclusions = $5,
                expires_at = $6,
                is_single_use = $7
            WHERE id = $1
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let updated = sqlx::query(query)
            .bind(promotion_id)
            .bind(request.organization_id)
            .bind(&request.name)
            .bind(&request.description)
            .bind(&request.exclusions)
            .bind(request.expiration)
            .bind(request.is_single_use)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .map_err(|err| write_failure(err, "failed to update promotion"))?;
        if updated.is_none() {
            return Err(ManageError::PromotionNotFound);
        }

        write_scope(&mut tx, promotion_id, &request).await?;

        tx.commit()
            .await
            .context("failed to commit promotion")
            .map_err(ManageError::Store)?;

        Ok(Promotion::from_request(promotion_id, request))
    }

    async fn delete(&self, promotion_id: i32) -> Result<bool> {
        let query = "DELETE FROM promotions WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(promotion_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete promotion")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_organization(&self, organization_id: i32) -> Result<Vec<PromotionSummary>> {
        let query = r"
            SELECT p.id, p.organization_id, p.name, p.description, p.exclusions,
                   p.expires_at, p.is_single_use,
                   ARRAY(
                       SELECT pc.community_id FROM promotion_communities pc
                       WHERE pc.promotion_id = p.id ORDER BY pc.community_id
                   ) AS communities,
                   ARRAY(
                       SELECT pm.membership_id FROM promotion_memberships pm
                       WHERE pm.promotion_id = p.id ORDER BY pm.membership_id
                   ) AS memberships,
                   (SELECT COUNT(*) FROM account_promotions ap WHERE ap.promotion_id = p.id)
                       AS redemptions
            FROM promotions p
            WHERE p.organization_id = $1
            ORDER BY p.id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list organization promotions")?;

        Ok(rows
            .into_iter()
            .map(|row| PromotionSummary {
                promotion: Promotion {
                    id: row.get("id"),
                    organization_id: row.get("organization_id"),
                    name: row.get("name"),
                    description: row.get("description"),
                    exclusions: row.get("exclusions"),
                    expiration: row.get("expires_at"),
                    is_single_use: row.get("is_single_use"),
                    communities: row.get("communities"),
                    memberships: row.get("memberships"),
                },
                redemptions: row.get("redemptions"),
            })
            .collect())
    }
}

/// Replace a promotion's community and membership scope rows.
async fn write_scope(
    conn: &mut PgConnection,
    promotion_id: i32,
    request: &PromotionRequest,
) -> Result<(), ManageError> {
    for (table, column, ids) in [
        ("promotion_communities", "community_id", &request.communities),
        ("promotion_memberships", "membership_id", &request.memberships),
    ] {
        let query = format!("DELETE FROM {table} WHERE promotion_id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query.as_str()
        );
        sqlx::query(&query)
            .bind(promotion_id)
            .execute(&mut *conn)
            .instrument(span)
            .await
            .context("failed to clear promotion scope")
            .map_err(ManageError::Store)?;

        if ids.is_empty() {
            continue;
        }

        let query = format!(
            "INSERT INTO {table} (promotion_id, {column}) \
             SELECT $1, scope.id FROM UNNEST($2::INTEGER[]) AS scope(id) \
             ON CONFLICT DO NOTHING"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        sqlx::query(&query)
            .bind(promotion_id)
            .bind(ids.as_slice())
            .execute(&mut *conn)
            .instrument(span)
            .await
            .map_err(|err| write_failure(err, "failed to insert promotion scope"))?;
    }
    Ok(())
}

fn write_failure(err: sqlx::Error, context: &'static str) -> ManageError {
    if is_foreign_key_violation(&err) {
        ManageError::UnknownReference
    } else {
        ManageError::Store(anyhow::Error::new(err).context(context))
    }
}

/// Load the promotion, its scope, the account's membership links and prior
/// redemption count. Links are returned regardless of expiration; `decide`
/// filters them against `now`.
async fn load_facts(
    conn: &mut PgConnection,
    account_id: i32,
    promotion_id: i32,
) -> Result<Option<EntitlementFacts>> {
    let query = "SELECT expires_at, is_single_use FROM promotions WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let Some(promotion) = sqlx::query(query)
        .bind(promotion_id)
        .fetch_optional(&mut *conn)
        .instrument(span)
        .await
        .context("failed to load promotion")?
    else {
        return Ok(None);
    };

    let query = "SELECT community_id FROM promotion_communities WHERE promotion_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let communities = sqlx::query(query)
        .bind(promotion_id)
        .fetch_all(&mut *conn)
        .instrument(span)
        .await
        .context("failed to load promotion communities")?
        .into_iter()
        .map(|row| row.get::<i32, _>("community_id"))
        .collect();

    let query = "SELECT membership_id FROM promotion_memberships WHERE promotion_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let memberships = sqlx::query(query)
        .bind(promotion_id)
        .fetch_all(&mut *conn)
        .instrument(span)
        .await
        .context("failed to load promotion memberships")?
        .into_iter()
        .map(|row| row.get::<i32, _>("membership_id"))
        .collect();

    let query = r"
        SELECT am.membership_id, m.community_id, am.expires_at
        FROM account_memberships am
        JOIN memberships m ON m.id = am.membership_id
        WHERE am.account_id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let links = sqlx::query(query)
        .bind(account_id)
        .fetch_all(&mut *conn)
        .instrument(span)
        .await
        .context("failed to load membership links")?
        .into_iter()
        .map(|row| MembershipLink {
            membership_id: row.get("membership_id"),
            community_id: row.get("community_id"),
            expires_at: row.get("expires_at"),
        })
        .collect();

    let query = r"
        SELECT COUNT(*) AS count
        FROM account_promotions
        WHERE account_id = $1 AND promotion_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let prior_redemptions: i64 = sqlx::query(query)
        .bind(account_id)
        .bind(promotion_id)
        .fetch_one(&mut *conn)
        .instrument(span)
        .await
        .context("failed to count prior redemptions")?
        .get("count");

    Ok(Some(EntitlementFacts {
        promotion_expires_at: promotion.get("expires_at"),
        single_use: promotion.get("is_single_use"),
        scope: PromotionScope {
            communities,
            memberships,
        },
        links,
        prior_redemptions,
    }))
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23503")
}

fn has_sqlstate(err: &sqlx::Error, sqlstate: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code == sqlstate),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{borrow::Cow, error::Error as StdError, fmt};

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("40001"),
        }));
        assert!(!is_unique_violation(&err));

        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn foreign_key_violation_is_an_unknown_reference() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23503"),
        }));
        assert!(is_foreign_key_violation(&err));
        assert!(matches!(
            write_failure(err, "insert"),
            ManageError::UnknownReference
        ));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(matches!(write_failure(err, "insert"), ManageError::Store(_)));
    }
}
