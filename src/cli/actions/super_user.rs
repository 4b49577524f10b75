use crate::{
    api::handlers::auth::{
        SuperUserOutcome, hash_password, upsert_super_user,
        utils::{normalize_email, valid_email},
    },
    db,
};
use anyhow::{Result, anyhow};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub email: String,
    pub password: Option<SecretString>,
}

/// Create the account if needed and grant it elevated privileges.
/// # Errors
/// Returns an error if the email is invalid, hashing fails or the database write fails.
pub async fn execute(args: Args) -> Result<()> {
    let email = normalize_email(&args.email);
    if !valid_email(&email) {
        return Err(anyhow!("invalid email: {}", args.email));
    }

    let password_hash = match args.password {
        Some(password) => Some(
            tokio::task::spawn_blocking(move || hash_password(password.expose_secret()))
                .await??,
        ),
        None => None,
    };

    let pool = db::connect(&args.dsn).await?;
    let outcome = upsert_super_user(&pool, &email, password_hash.as_deref()).await;
    pool.close().await;

    match outcome? {
        SuperUserOutcome::Created(id) => info!("Created super user {email} (id {id})"),
        SuperUserOutcome::Promoted(id) => info!("Promoted {email} (id {id}) to super user"),
    }
    Ok(())
}
