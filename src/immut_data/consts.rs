use std::time::Duration;

use serenity::prelude::GatewayIntents;

pub(crate) const SCHEMA: &str = include_str!("../../schema.sql");

pub(crate) const DISCORD_INTENTS: GatewayIntents = {
    let fst = GatewayIntents::GUILDS.bits();
    let snd = GatewayIntents::GUILD_MESSAGES.bits();
    let trd = GatewayIntents::MESSAGE_CONTENT.bits();
    match GatewayIntents::from_bits(fst | snd | trd) {
        Some(intents) => intents,
        None => panic!("Invalid intents"),
    }
};

/// Passive XP granted per eligible message, rolled uniformly from this range.
pub(crate) const PASSIVE_XP_MIN: u64 = 15;
pub(crate) const PASSIVE_XP_MAX: u64 = 25;

/// Minimum gap between two passive grants for the same (guild, user).
pub(crate) const PASSIVE_XP_COOLDOWN_SECS: i64 = 120;

pub(crate) const MAX_PREFIX_LEN: usize = 10;
pub(crate) const DELETED_MEDIA_CAP: usize = 10;
pub(crate) const LEADERBOARD_LEN: usize = 10;

pub(crate) const BACKUP_INTERVAL: Duration = Duration::from_secs(300);

/// Depth of the write-through queue. When the persistence worker falls this
/// far behind, newer snapshots are dropped with a warning.
pub(crate) const PERSIST_QUEUE_DEPTH: usize = 256;
