//! Database pool and schema management.

use anyhow::{Context, Result};
use sqlx::{Connection, PgConnection, PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{Instrument, debug, info};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

/// Connect the shared pool used by the HTTP server.
///
/// # Errors
/// Returns an error if the database is unreachable.
pub async fn connect(dsn: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")
}

/// Apply `sql/schema.sql` statement by statement over a single connection.
///
/// # Errors
/// Returns an error naming the first statement that failed.
pub async fn apply_schema(dsn: &str) -> Result<usize> {
    let mut connection = PgConnection::connect(dsn)
        .await
        .context("failed to connect for schema setup")?;

    let statements = split_sql_statements(SCHEMA_SQL);
    for (index, statement) in statements.iter().enumerate() {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DDL",
            db.statement = statement.as_str()
        );
        sqlx::query(statement)
            .execute(&mut connection)
            .instrument(span)
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        debug!("applied schema statement {}", index + 1);
    }

    info!("Applied {} schema statements", statements.len());
    Ok(statements.len())
}

/// Split a schema file on statement-terminating lines, dropping comment-only
/// chunks.
#[must_use]
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sql_statements_handles_multiline_and_comments() {
        let sql = "-- header\nCREATE TABLE a (\n  id INT\n);\n\nCREATE INDEX b ON a (id);\nSELECT 1";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with("CREATE TABLE a"));
        assert!(statements[0].ends_with(");"));
        assert_eq!(statements[1], "CREATE INDEX b ON a (id);");
        assert_eq!(statements[2], "SELECT 1");
    }

    #[test]
    fn schema_contains_single_use_backstop() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert!(statements.iter().all(|statement| !statement.starts_with("--")));
        assert!(
            statements
                .iter()
                .any(|statement| statement.contains("account_promotions_single_use_key")
                    && statement.contains("WHERE single_use"))
        );
        assert!(
            statements
                .iter()
                .any(|statement| statement.contains("LOWER(email)"))
        );
    }
}
