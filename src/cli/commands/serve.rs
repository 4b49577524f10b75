use clap::{Arg, Command};

use crate::api::handlers::auth::MAX_TTL_SECONDS;

pub const NAME: &str = "serve";

pub const ARG_PORT: &str = "port";
pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_APP_DOMAIN: &str = "app-domain";
pub const ARG_SESSION_TTL: &str = "session-ttl-seconds";
pub const ARG_RESET_TTL: &str = "reset-ttl-seconds";
pub const ARG_ACTIVATION_TTL: &str = "activation-ttl-seconds";
pub const ARG_LOOKUP_TIMEOUT: &str = "lookup-timeout-seconds";
pub const ARG_REQUEST_TIMEOUT: &str = "request-timeout-seconds";

#[must_use]
pub fn subcommand() -> Command {
    let command = Command::new(NAME)
        .about("Run the HTTP API")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("PERAGRIN_PORT")
                .value_parser(clap::value_parser!(u16)),
        );
    let command = with_token_args(command);
    with_timeout_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("Secret used to sign and verify bearer tokens")
                .env("PERAGRIN_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_APP_DOMAIN)
                .long(ARG_APP_DOMAIN)
                .help("Frontend base URL used for password reset and activation links")
                .env("PERAGRIN_APP_DOMAIN")
                .default_value("https://peragrin.com"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Session token TTL in seconds")
                .env("PERAGRIN_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_RESET_TTL)
                .long(ARG_RESET_TTL)
                .help("Password reset token TTL in seconds")
                .env("PERAGRIN_RESET_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_ACTIVATION_TTL)
                .long(ARG_ACTIVATION_TTL)
                .help("Account activation token TTL in seconds")
                .env("PERAGRIN_ACTIVATION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
}

fn with_timeout_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOOKUP_TIMEOUT)
                .long(ARG_LOOKUP_TIMEOUT)
                .help("Deadline for credential lookups in seconds")
                .env("PERAGRIN_LOOKUP_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT)
                .long(ARG_REQUEST_TIMEOUT)
                .help("Overall HTTP request deadline in seconds")
                .env("PERAGRIN_REQUEST_TIMEOUT_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
