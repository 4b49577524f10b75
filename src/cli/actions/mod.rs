pub mod migrate;
pub mod serve;
pub mod super_user;

mod run;

#[derive(Debug)]
pub enum Action {
    Serve(serve::Args),
    Migrate { dsn: String },
    AddSuperUser(super_user::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
