use std::env;
use std::path::PathBuf;

/// Run-time configuration of the bot, read from the environment once at
/// startup.
#[derive(Clone)]
pub(crate) struct BotCfg {
    pub(crate) discord_token: String,
    pub(crate) database_path: PathBuf,
    pub(crate) default_prefix: String,
    /// `owner/repo` coordinate of the offsite backup repository.
    pub(crate) backup_repo: Option<String>,
    pub(crate) backup_token: Option<String>,
}

impl BotCfg {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let discord_token = env::var("DISCORD_TOKEN")
            .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN is not set"))?;
        let database_path =
            PathBuf::from(env::var("DATABASE_PATH").unwrap_or_else(|_| "verdant.db".to_owned()));
        let default_prefix = env::var("PREFIX").unwrap_or_else(|_| "!".to_owned());
        let backup_repo = env::var("GITHUB_REPO").ok();
        let backup_token = env::var("GITHUB_TOKEN").ok();
        Ok(Self {
            discord_token,
            database_path,
            default_prefix,
            backup_repo,
            backup_token,
        })
    }
}
