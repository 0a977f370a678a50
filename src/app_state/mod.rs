//! Guild-scoped in-memory state with write-through persistence.
//!
//! [`AppState`] is the single owner of all mutable bot state for the running
//! process. It is constructed once in `main`, injected through serenity's
//! TypeMap, and handed a [`PersistHandle`] so every mutation can enqueue a
//! snapshot for the persistence worker. The durable store is a best-effort
//! backstop: a failed write-through is logged and the in-memory value stands.

use std::collections::HashMap;

use chrono::Utc;
use serenity::model::prelude::{ChannelId, GuildId, UserId};
use sqlx::SqlitePool;
use tracing::warn;

use crate::db::{self, dao};
use crate::immut_data::consts::{DELETED_MEDIA_CAP, LEADERBOARD_LEN, PASSIVE_XP_COOLDOWN_SECS};
use crate::persist::{PersistHandle, PersistReq};

pub(crate) mod levels;
pub(crate) mod rewards;
pub(crate) mod type_map_keys;

/// Moderation action kinds tracked in the per-guild log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ActionKind {
    Command,
    Warned,
    Kicked,
    Banned,
    Unbanned,
    TimedOut,
    UntimedOut,
    Jailed,
    Unjailed,
}

impl ActionKind {
    pub(crate) const ALL: [ActionKind; 9] = [
        ActionKind::Command,
        ActionKind::Warned,
        ActionKind::Kicked,
        ActionKind::Banned,
        ActionKind::Unbanned,
        ActionKind::TimedOut,
        ActionKind::UntimedOut,
        ActionKind::Jailed,
        ActionKind::Unjailed,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ActionKind::Command => "commands",
            ActionKind::Warned => "warned",
            ActionKind::Kicked => "kicked",
            ActionKind::Banned => "banned",
            ActionKind::Unbanned => "unbanned",
            ActionKind::TimedOut => "timed_out",
            ActionKind::UntimedOut => "untimed_out",
            ActionKind::Jailed => "jailed",
            ActionKind::Unjailed => "unjailed",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DeletedMedia {
    pub(crate) author: String,
    pub(crate) content: String,
    pub(crate) media_url: String,
    pub(crate) timestamp: String,
}

impl From<dao::DeletedMediaRow> for DeletedMedia {
    fn from(row: dao::DeletedMediaRow) -> Self {
        Self {
            author: row.author,
            content: row.content,
            media_url: row.media_url,
            timestamp: row.timestamp,
        }
    }
}

impl DeletedMedia {
    fn to_row(&self) -> dao::DeletedMediaRow {
        dao::DeletedMediaRow {
            author: self.author.clone(),
            content: self.content.clone(),
            media_url: self.media_url.clone(),
            timestamp: self.timestamp.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AfkEntry {
    pub(crate) reason: String,
    /// ISO-8601, as persisted.
    pub(crate) since: String,
}

/// Level transition produced by an XP mutation. `new` may exceed `old` by
/// more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LevelUp {
    pub(crate) old: u32,
    pub(crate) new: u32,
}

#[derive(Debug, Default)]
pub(crate) struct GuildState {
    prefix: Option<String>,
    level_channel: Option<ChannelId>,
    xp: HashMap<UserId, u64>,
    mod_log: HashMap<UserId, HashMap<ActionKind, Vec<String>>>,
    deleted_media: Vec<DeletedMedia>,
}

pub(crate) struct AppState {
    guilds: HashMap<GuildId, GuildState>,
    afk: HashMap<UserId, AfkEntry>,
    cooldowns: HashMap<GuildId, HashMap<UserId, i64>>,
    last_seen: HashMap<GuildId, String>,
    default_prefix: String,
    persist: PersistHandle,
}

impl AppState {
    pub(crate) fn new(default_prefix: String, persist: PersistHandle) -> Self {
        Self {
            guilds: HashMap::new(),
            afk: HashMap::new(),
            cooldowns: HashMap::new(),
            last_seen: HashMap::new(),
            default_prefix,
            persist,
        }
    }

    /// Warms the cache for `guild`. Idempotent; awaited before any handler
    /// touches the guild, so reads never observe a half-loaded state.
    pub(crate) async fn ensure_loaded(
        &mut self,
        pool: &SqlitePool,
        guild: GuildId,
    ) -> crate::Result<()> {
        if self.guilds.contains_key(&guild) {
            return Ok(());
        }
        let guild_id = guild.0 as i64;

        let mut state = GuildState::default();
        if let Some(settings) = db::load_guild_settings(pool, guild_id).await? {
            state.prefix = settings.prefix;
            state.level_channel = settings.level_channel.map(|id| ChannelId(id as u64));
        }
        for row in db::load_xp(pool, guild_id).await? {
            state.xp.insert(UserId(row.user_id as u64), row.xp.max(0) as u64);
        }
        for row in db::load_mod_stats(pool, guild_id).await? {
            let Some(kind) = ActionKind::parse(&row.action) else {
                warn!(action = %row.action, "skipping unknown moderation action kind");
                continue;
            };
            state
                .mod_log
                .entry(UserId(row.user_id as u64))
                .or_default()
                .entry(kind)
                .or_default()
                .push(row.timestamp);
        }
        state.deleted_media = db::load_deleted_media(pool, guild_id)
            .await?
            .into_iter()
            .map(DeletedMedia::from)
            .collect();

        self.guilds.insert(guild, state);
        Ok(())
    }

    /// Restores the process-wide AFK table. Called once at ready.
    pub(crate) async fn load_afk_table(&mut self, pool: &SqlitePool) -> crate::Result<()> {
        self.afk.clear();
        for row in db::load_afk(pool).await? {
            self.afk.insert(
                UserId(row.user_id as u64),
                AfkEntry {
                    reason: row.reason,
                    since: row.since,
                },
            );
        }
        Ok(())
    }

    pub(crate) fn xp_of(&self, guild: GuildId, user: UserId) -> u64 {
        self.guilds
            .get(&guild)
            .and_then(|g| g.xp.get(&user))
            .copied()
            .unwrap_or(0)
    }

    /// Stores a new XP total, clamped at zero, and enqueues the guild's XP
    /// table for write-through.
    pub(crate) fn set_xp(&mut self, guild: GuildId, user: UserId, xp: i64) {
        let state = self.guilds.entry(guild).or_default();
        state.xp.insert(user, xp.max(0) as u64);
        self.persist_xp(guild);
    }

    /// Adds `amount` (possibly negative) to the user's XP and reports the
    /// level transition when the derived level rose. Saturates at `i64::MAX`
    /// rather than wrapping.
    pub(crate) fn add_xp(&mut self, guild: GuildId, user: UserId, amount: i64) -> Option<LevelUp> {
        let current = self.xp_of(guild, user) as i64;
        let old = levels::level_for_xp(current);
        self.set_xp(guild, user, current.saturating_add(amount));
        let new = levels::level_for_xp(self.xp_of(guild, user) as i64);
        (new > old).then_some(LevelUp { old, new })
    }

    pub(crate) fn leaderboard(&self, guild: GuildId) -> Vec<(UserId, u64)> {
        let Some(state) = self.guilds.get(&guild) else {
            return Vec::new();
        };
        let mut rows: Vec<(UserId, u64)> = state.xp.iter().map(|(u, x)| (*u, *x)).collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        rows.truncate(LEADERBOARD_LEN);
        rows
    }

    pub(crate) fn prefix_of(&self, guild: GuildId) -> &str {
        self.guilds
            .get(&guild)
            .and_then(|g| g.prefix.as_deref())
            .unwrap_or(&self.default_prefix)
    }

    pub(crate) fn set_prefix(&mut self, guild: GuildId, prefix: String) {
        self.guilds.entry(guild).or_default().prefix = Some(prefix);
        self.persist_settings();
    }

    pub(crate) fn level_channel_of(&self, guild: GuildId) -> Option<ChannelId> {
        self.guilds.get(&guild).and_then(|g| g.level_channel)
    }

    pub(crate) fn set_level_channel(&mut self, guild: GuildId, channel: ChannelId) {
        self.guilds.entry(guild).or_default().level_channel = Some(channel);
        self.persist_settings();
    }

    pub(crate) fn record_mod_action(&mut self, guild: GuildId, moderator: UserId, kind: ActionKind) {
        self.guilds
            .entry(guild)
            .or_default()
            .mod_log
            .entry(moderator)
            .or_default()
            .entry(kind)
            .or_default()
            .push(Utc::now().to_rfc3339());
        self.persist_mod_log(guild);
    }

    /// Per-action counts for a moderator, in [`ActionKind::ALL`] order.
    pub(crate) fn mod_counts(&self, guild: GuildId, moderator: UserId) -> Vec<(ActionKind, usize)> {
        let by_kind = self
            .guilds
            .get(&guild)
            .and_then(|g| g.mod_log.get(&moderator));
        ActionKind::ALL
            .into_iter()
            .map(|kind| {
                let count = by_kind.and_then(|m| m.get(&kind)).map_or(0, Vec::len);
                (kind, count)
            })
            .collect()
    }

    /// Inserts at the head of the ring buffer and truncates to the cap.
    pub(crate) fn record_deleted_media(&mut self, guild: GuildId, entry: DeletedMedia) {
        let state = self.guilds.entry(guild).or_default();
        state.deleted_media.insert(0, entry);
        state.deleted_media.truncate(DELETED_MEDIA_CAP);
        self.persist_deleted_media(guild);
    }

    pub(crate) fn set_afk(&mut self, user: UserId, reason: String) {
        self.afk.insert(
            user,
            AfkEntry {
                reason,
                since: Utc::now().to_rfc3339(),
            },
        );
        self.persist_afk();
    }

    pub(crate) fn clear_afk(&mut self, user: UserId) -> Option<AfkEntry> {
        let entry = self.afk.remove(&user)?;
        self.persist_afk();
        Some(entry)
    }

    pub(crate) fn afk_entry(&self, user: UserId) -> Option<&AfkEntry> {
        self.afk.get(&user)
    }

    /// Gate for passive XP accrual: true at most once per cooldown window per
    /// (guild, user). Never persisted.
    pub(crate) fn passive_xp_allowed(&mut self, guild: GuildId, user: UserId, now: i64) -> bool {
        let guild_cd = self.cooldowns.entry(guild).or_default();
        let last = guild_cd.get(&user).copied().unwrap_or(i64::MIN);
        if now.saturating_sub(last) > PASSIVE_XP_COOLDOWN_SECS {
            guild_cd.insert(user, now);
            true
        } else {
            false
        }
    }

    pub(crate) fn touch_last_seen(&mut self, guild: GuildId) {
        self.last_seen.insert(guild, Utc::now().to_rfc3339());
        let rows: Vec<(i64, String)> = self
            .last_seen
            .iter()
            .map(|(g, ts)| (g.0 as i64, ts.clone()))
            .collect();
        self.persist.enqueue(PersistReq::LastSeen(rows));
    }

    fn persist_xp(&self, guild: GuildId) {
        let Some(state) = self.guilds.get(&guild) else {
            return;
        };
        let rows: Vec<(i64, i64)> = state
            .xp
            .iter()
            .map(|(u, x)| (u.0 as i64, *x as i64))
            .collect();
        self.persist.enqueue(PersistReq::XpTable {
            guild_id: guild.0 as i64,
            rows,
        });
    }

    fn persist_settings(&self) {
        let rows: Vec<dao::SettingsRow> = self
            .guilds
            .iter()
            .map(|(guild, state)| dao::SettingsRow {
                guild_id: guild.0 as i64,
                // Unset stays NULL so the guild keeps tracking the default
                // prefix across restarts.
                prefix: state.prefix.clone(),
                level_channel: state.level_channel.map(|c| c.0 as i64),
            })
            .collect();
        self.persist.enqueue(PersistReq::Settings(rows));
    }

    fn persist_mod_log(&self, guild: GuildId) {
        let Some(state) = self.guilds.get(&guild) else {
            return;
        };
        let mut rows = Vec::new();
        for (moderator, by_kind) in &state.mod_log {
            for (kind, timestamps) in by_kind {
                for ts in timestamps {
                    rows.push(dao::ModStatRow {
                        user_id: moderator.0 as i64,
                        action: kind.as_str().to_owned(),
                        timestamp: ts.clone(),
                    });
                }
            }
        }
        self.persist.enqueue(PersistReq::ModLog {
            guild_id: guild.0 as i64,
            rows,
        });
    }

    fn persist_deleted_media(&self, guild: GuildId) {
        let Some(state) = self.guilds.get(&guild) else {
            return;
        };
        let rows: Vec<dao::DeletedMediaRow> =
            state.deleted_media.iter().map(DeletedMedia::to_row).collect();
        self.persist.enqueue(PersistReq::DeletedMedia {
            guild_id: guild.0 as i64,
            rows,
        });
    }

    fn persist_afk(&self) {
        let rows: Vec<dao::AfkRow> = self
            .afk
            .iter()
            .map(|(user, entry)| dao::AfkRow {
                user_id: user.0 as i64,
                reason: entry.reason.clone(),
                since: entry.since.clone(),
            })
            .collect();
        self.persist.enqueue(PersistReq::AfkTable(rows));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_state() -> (AppState, tokio::sync::mpsc::Receiver<PersistReq>) {
        let (persist, rx) = PersistHandle::pair(64);
        (AppState::new("!".to_owned(), persist), rx)
    }

    const G: GuildId = GuildId(1);
    const U: UserId = UserId(10);

    #[test]
    fn set_xp_clamps_negative_to_zero() {
        let (mut state, _rx) = fresh_state();
        state.set_xp(G, U, -10);
        assert_eq!(state.xp_of(G, U), 0);
    }

    #[test]
    fn unknown_user_reads_zero() {
        let (state, _rx) = fresh_state();
        assert_eq!(state.xp_of(G, U), 0);
    }

    #[test]
    fn add_xp_reports_level_up_edge() {
        let (mut state, _rx) = fresh_state();
        let up = state.add_xp(G, U, 150).expect("0 -> 150 crosses level 1");
        assert_eq!(up, LevelUp { old: 0, new: 1 });
        assert_eq!(state.xp_of(G, U), 150);
        assert!(state.add_xp(G, U, 10).is_none());
    }

    #[test]
    fn add_xp_level_is_associative_over_splits() {
        let (mut a, _rx1) = fresh_state();
        let (mut b, _rx2) = fresh_state();
        for (x, y) in [(30, 80), (100, 0), (0, 100), (250, 1000)] {
            a.set_xp(G, U, 0);
            b.set_xp(G, U, 0);
            a.add_xp(G, U, x);
            a.add_xp(G, U, y);
            b.add_xp(G, U, x + y);
            assert_eq!(a.xp_of(G, U), b.xp_of(G, U));
        }
    }

    #[test]
    fn add_xp_can_jump_multiple_levels() {
        let (mut state, _rx) = fresh_state();
        let up = state
            .add_xp(G, U, levels::xp_for_level(6) as i64)
            .expect("jump to level 6");
        assert_eq!(up.old, 0);
        assert_eq!(up.new, 6);
    }

    #[test]
    fn add_xp_saturates_at_the_top_of_the_curve() {
        let (mut state, _rx) = fresh_state();
        state.add_xp(G, U, i64::MAX);
        let top = state.xp_of(G, U);
        assert_eq!(top, i64::MAX as u64);
        // A second maximal grant must neither wrap nor drop the level.
        assert!(state.add_xp(G, U, i64::MAX).is_none());
        assert_eq!(state.xp_of(G, U), top);
    }

    #[test]
    fn deleted_media_ring_buffer_caps_at_ten_newest_first() {
        let (mut state, _rx) = fresh_state();
        for i in 1..=12 {
            state.record_deleted_media(
                G,
                DeletedMedia {
                    author: format!("author{i}"),
                    content: String::new(),
                    media_url: format!("https://cdn.example/{i}.png"),
                    timestamp: format!("t{i}"),
                },
            );
        }
        let media = &state.guilds[&G].deleted_media;
        assert_eq!(media.len(), 10);
        assert_eq!(media[0].author, "author12");
        assert_eq!(media[9].author, "author3");
    }

    #[test]
    fn afk_round_trip() {
        let (mut state, _rx) = fresh_state();
        state.set_afk(U, "lunch".to_owned());
        assert_eq!(state.afk_entry(U).unwrap().reason, "lunch");
        assert!(state.clear_afk(U).is_some());
        assert!(state.afk_entry(U).is_none());
        assert!(state.clear_afk(U).is_none());
    }

    #[test]
    fn leaderboard_is_descending_and_truncated() {
        let (mut state, _rx) = fresh_state();
        state.set_xp(G, UserId(1), 500);
        state.set_xp(G, UserId(2), 1200);
        state.set_xp(G, UserId(3), 300);
        let board = state.leaderboard(G);
        let ids: Vec<u64> = board.iter().map(|(u, _)| u.0).collect();
        assert_eq!(ids, vec![2, 1, 3]);

        for i in 0..20 {
            state.set_xp(G, UserId(100 + i), 10_000 + (i as i64) * 10);
        }
        assert_eq!(state.leaderboard(G).len(), 10);
    }

    #[test]
    fn passive_cooldown_gates_within_window() {
        let (mut state, _rx) = fresh_state();
        assert!(state.passive_xp_allowed(G, U, 1_000));
        assert!(!state.passive_xp_allowed(G, U, 1_060));
        assert!(state.passive_xp_allowed(G, U, 1_000 + 121));
        // Per-guild scoping: another guild has its own window.
        assert!(state.passive_xp_allowed(GuildId(2), U, 1_060));
    }

    #[test]
    fn prefix_falls_back_to_default() {
        let (mut state, _rx) = fresh_state();
        assert_eq!(state.prefix_of(G), "!");
        state.set_prefix(G, "?".to_owned());
        assert_eq!(state.prefix_of(G), "?");
    }

    #[test]
    fn mutations_enqueue_snapshots() {
        let (mut state, mut rx) = fresh_state();
        state.set_xp(G, U, 50);
        match rx.try_recv().expect("snapshot enqueued") {
            PersistReq::XpTable { guild_id, rows } => {
                assert_eq!(guild_id, 1);
                assert_eq!(rows, vec![(10, 50)]);
            }
            other => panic!("unexpected snapshot: {other:?}"),
        }
    }

    #[test]
    fn unset_prefix_persists_as_null() {
        let (mut state, mut rx) = fresh_state();
        state.set_level_channel(G, ChannelId(5));
        match rx.try_recv().expect("snapshot enqueued") {
            PersistReq::Settings(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].prefix, None);
                assert_eq!(rows[0].level_channel, Some(5));
            }
            other => panic!("unexpected snapshot: {other:?}"),
        }
        assert_eq!(state.prefix_of(G), "!");
    }

    #[test]
    fn mod_counts_track_recorded_actions() {
        let (mut state, _rx) = fresh_state();
        state.record_mod_action(G, U, ActionKind::Warned);
        state.record_mod_action(G, U, ActionKind::Warned);
        state.record_mod_action(G, U, ActionKind::Kicked);
        let counts = state.mod_counts(G, U);
        let warned = counts
            .iter()
            .find(|(k, _)| *k == ActionKind::Warned)
            .unwrap()
            .1;
        let kicked = counts
            .iter()
            .find(|(k, _)| *k == ActionKind::Kicked)
            .unwrap()
            .1;
        assert_eq!((warned, kicked), (2, 1));
    }

    #[tokio::test]
    async fn ensure_loaded_is_idempotent_and_reads_store() {
        let pool = db::memory_pool().await;
        db::replace_xp(&pool, 1, &[(10, 777)]).await.unwrap();

        let (mut state, _rx) = fresh_state();
        state.ensure_loaded(&pool, G).await.unwrap();
        assert_eq!(state.xp_of(G, U), 777);

        // A second load must not clobber in-memory mutations.
        state.set_xp(G, U, 888);
        state.ensure_loaded(&pool, G).await.unwrap();
        assert_eq!(state.xp_of(G, U), 888);
    }

    #[tokio::test]
    async fn ensure_loaded_of_absent_guild_is_empty() {
        let pool = db::memory_pool().await;
        let (mut state, _rx) = fresh_state();
        state.ensure_loaded(&pool, G).await.unwrap();
        assert_eq!(state.xp_of(G, U), 0);
        assert!(state.leaderboard(G).is_empty());
    }
}
