//! Module for Data Access Objects

use sqlx::FromRow;

#[derive(FromRow, Debug, Clone)]
pub(crate) struct SettingsRow {
    pub(crate) guild_id: i64,
    pub(crate) prefix: Option<String>,
    pub(crate) level_channel: Option<i64>,
}

#[derive(FromRow, Debug, Clone)]
pub(crate) struct XpRow {
    pub(crate) user_id: i64,
    pub(crate) xp: i64,
}

#[derive(FromRow, Debug, Clone)]
pub(crate) struct ModStatRow {
    pub(crate) user_id: i64,
    pub(crate) action: String,
    pub(crate) timestamp: String,
}

#[derive(FromRow, Debug, Clone)]
pub(crate) struct AfkRow {
    pub(crate) user_id: i64,
    pub(crate) reason: String,
    pub(crate) since: String,
}

#[derive(FromRow, Debug, Clone)]
pub(crate) struct DeletedMediaRow {
    pub(crate) author: String,
    pub(crate) content: String,
    pub(crate) media_url: String,
    pub(crate) timestamp: String,
}
