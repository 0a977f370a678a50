use std::sync::Arc;

use serenity::client::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Executor;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod backup;
mod bots;
mod commands;
mod db;
mod error;
mod gateway;
mod immut_data;
mod persist;
mod util;

pub(crate) use error::{Error, Result};

use app_state::type_map_keys::AppStateKey;
use app_state::AppState;
use backup::github::GithubBackup;
use bots::MainBot;
use immut_data::consts::{DISCORD_INTENTS, PERSIST_QUEUE_DEPTH, SCHEMA};
use immut_data::dynamic::BotCfg;
use persist::PersistHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = BotCfg::from_env()?;

    let backup_store: Option<Arc<GithubBackup>> = match (&cfg.backup_repo, &cfg.backup_token) {
        (Some(repo), Some(token)) => {
            let file_name = cfg
                .database_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("verdant.db")
                .to_owned();
            Some(Arc::new(GithubBackup::new(
                repo.clone(),
                token.clone(),
                file_name,
            )))
        }
        _ => {
            warn!("GITHUB_REPO/GITHUB_TOKEN not set; offsite backup disabled, store is local-only");
            None
        }
    };

    // Adopt the latest offsite snapshot before the pool opens the file.
    if let Some(store) = &backup_store {
        backup::restore_on_startup(store.as_ref(), &cfg.database_path).await;
    }

    let pool = SqlitePoolOptions::new()
        .connect_with(
            SqliteConnectOptions::new()
                .filename(&cfg.database_path)
                .create_if_missing(true),
        )
        .await?;
    pool.execute(SCHEMA).await?;

    let (persist_handle, persist_rx) = PersistHandle::pair(PERSIST_QUEUE_DEPTH);
    tokio::spawn(persist::run_worker(pool.clone(), persist_rx));

    if let Some(store) = backup_store {
        tokio::spawn(backup::run_backup_loop(store, cfg.database_path.clone()));
    }

    let app_state = AppState::new(cfg.default_prefix.clone(), persist_handle);
    let bot = MainBot::new(pool);

    let mut client = Client::builder(&cfg.discord_token, DISCORD_INTENTS)
        .event_handler(bot)
        .type_map_insert::<AppStateKey>(app_state)
        .await?;

    info!("starting gateway client");
    client.start().await?;
    Ok(())
}
