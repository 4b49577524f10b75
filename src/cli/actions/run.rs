use crate::cli::actions::{Action, migrate, serve, super_user};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Serve(args) => serve::execute(args).await,
        Action::Migrate { dsn } => migrate::execute(&dsn).await,
        Action::AddSuperUser(args) => super_user::execute(args).await,
    }
}
