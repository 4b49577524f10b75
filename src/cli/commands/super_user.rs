use clap::{Arg, Command};

pub const NAME: &str = "add-super-user";

pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";

#[must_use]
pub fn subcommand() -> Command {
    Command::new(NAME)
        .about("Create or promote an account with elevated privileges")
        .arg(
            Arg::new(ARG_EMAIL)
                .short('e')
                .long(ARG_EMAIL)
                .help("Account email")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .long(ARG_PASSWORD)
                .help("Password to set on the account")
                .long_help(
                    "Password to set on the account. When omitted an existing password is kept and a new account is created without one.",
                )
                .env("PERAGRIN_SUPER_USER_PASSWORD")
                .hide_env_values(true),
        )
}
