//! Map validated CLI arguments to the action the binary runs.

use crate::cli::actions::{Action, serve, super_user};
use crate::cli::commands::{self, serve as serve_args, super_user as super_user_args};
use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;
use std::time::Duration;

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or the subcommand is unknown.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let dsn = matches
        .get_one::<String>(commands::ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    match matches.subcommand() {
        Some((serve_args::NAME, sub)) => Ok(Action::Serve(serve_from(sub, dsn)?)),
        Some((commands::MIGRATE, _)) => Ok(Action::Migrate { dsn }),
        Some((super_user_args::NAME, sub)) => {
            let email = sub
                .get_one::<String>(super_user_args::ARG_EMAIL)
                .cloned()
                .context("missing required argument: --email")?;
            let password = sub
                .get_one::<String>(super_user_args::ARG_PASSWORD)
                .cloned()
                .map(SecretString::from);
            Ok(Action::AddSuperUser(super_user::Args {
                dsn,
                email,
                password,
            }))
        }
        Some((name, _)) => Err(anyhow!("unknown command: {name}")),
        None => Err(anyhow!("missing command")),
    }
}

fn serve_from(matches: &clap::ArgMatches, dsn: String) -> Result<serve::Args> {
    let token_secret = matches
        .get_one::<String>(serve_args::ARG_TOKEN_SECRET)
        .cloned()
        .context("missing required argument: --token-secret")?;
    let app_domain = matches
        .get_one::<String>(serve_args::ARG_APP_DOMAIN)
        .cloned()
        .context("missing required argument: --app-domain")?;

    Ok(serve::Args {
        port: matches
            .get_one::<u16>(serve_args::ARG_PORT)
            .copied()
            .unwrap_or(8080),
        dsn,
        token_secret: SecretString::from(token_secret),
        app_domain,
        session_ttl_seconds: seconds(matches, serve_args::ARG_SESSION_TTL)?,
        reset_ttl_seconds: seconds(matches, serve_args::ARG_RESET_TTL)?,
        activation_ttl_seconds: seconds(matches, serve_args::ARG_ACTIVATION_TTL)?,
        lookup_timeout_seconds: timeout(matches, serve_args::ARG_LOOKUP_TIMEOUT)?,
        request_timeout: Duration::from_secs(timeout(matches, serve_args::ARG_REQUEST_TIMEOUT)?),
    })
}

fn seconds(matches: &clap::ArgMatches, name: &str) -> Result<i64> {
    matches
        .get_one::<i64>(name)
        .copied()
        .with_context(|| format!("missing required argument: --{name}"))
}

fn timeout(matches: &clap::ArgMatches, name: &str) -> Result<u64> {
    matches
        .get_one::<u64>(name)
        .copied()
        .with_context(|| format!("missing required argument: --{name}"))
}
