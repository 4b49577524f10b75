use crate::db;
use anyhow::Result;
use tracing::info;

/// Apply the embedded schema.
/// # Errors
/// Returns an error if the database is unreachable or a statement fails.
pub async fn execute(dsn: &str) -> Result<()> {
    let applied = db::apply_schema(dsn).await?;
    info!("Schema up to date ({applied} statements)");
    Ok(())
}
