//! Serenity event wiring.
//!
//! Everything here is adapter code: it warms the cache, translates platform
//! events into [`AppState`] mutations, and dispatches prefix commands through
//! the [`CommandContext`] seam. A failure in one handler is logged and never
//! allowed to take down event processing for other guilds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serenity::{
    async_trait,
    model::prelude::{ChannelId, Guild, GuildId, Message, MessageId, Ready, UserId},
    prelude::{Context, EventHandler},
    utils::MessageBuilder,
};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::{
    app_state::{
        rewards, type_map_keys::AppStateKey, ActionKind, AppState, DeletedMedia,
    },
    commands::{
        self,
        context::{CommandContext, MessageContext},
        Outcome,
    },
    gateway::{ChatGateway, SerenityGateway},
    immut_data::consts::{PASSIVE_XP_MAX, PASSIVE_XP_MIN},
    util::{format_duration, parse_channel_arg, parse_user_arg},
};

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp"];

pub(crate) struct MainBot {
    /// Database connection pool used to warm guild state on demand.
    pool: SqlitePool,
}

impl MainBot {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn warm_guild(&self, state: &mut AppState, guild: GuildId) -> bool {
        if let Err(e) = state.ensure_loaded(&self.pool, guild).await {
            error!(guild = guild.0, error = %e, "failed to warm guild state");
            return false;
        }
        state.touch_last_seen(guild);
        true
    }

    async fn dispatch(
        &self,
        ctx: &Context,
        msg: &Message,
        guild_id: GuildId,
        state: &mut AppState,
        gateway: &dyn ChatGateway,
        rest: &str,
    ) -> crate::Result<()> {
        let mut parts = rest.split_whitespace();
        let Some(name) = parts.next() else {
            return Ok(());
        };
        let args: Vec<&str> = parts.collect();
        let cctx = MessageContext { ctx, msg, guild_id };

        const KNOWN: &[&str] = &[
            "setprefix",
            "rank",
            "leaderboard",
            "xp_add",
            "xp_remove",
            "level_set",
            "levelchannelset",
            "afk",
            "rewards",
            "modstats",
        ];
        if !KNOWN.contains(&name) {
            return Ok(());
        }

        let outcome = match name {
            "setprefix" => match args.first() {
                Some(prefix) => commands::set_prefix(&cctx, state, prefix).await,
                None => reply_usage(&cctx, "setprefix <prefix>").await,
            },
            "rank" => {
                let target = args.first().and_then(|a| parse_user_arg(a));
                commands::rank(&cctx, state, gateway, target).await
            }
            "leaderboard" => commands::leaderboard(&cctx, state, gateway).await,
            "xp_add" => match parse_user_amount(&args) {
                Some((user, amount)) => {
                    commands::xp_add(&cctx, state, gateway, user, amount).await
                }
                None => reply_usage(&cctx, "xp_add <user> <amount>").await,
            },
            "xp_remove" => match parse_user_amount(&args) {
                Some((user, amount)) => commands::xp_remove(&cctx, state, user, amount).await,
                None => reply_usage(&cctx, "xp_remove <user> <amount>").await,
            },
            "level_set" => match parse_user_amount(&args) {
                Some((user, level)) => commands::level_set(&cctx, state, user, level).await,
                None => reply_usage(&cctx, "level_set <user> <level>").await,
            },
            "levelchannelset" => match args.first().and_then(|a| parse_channel_arg(a)) {
                Some(channel) => commands::set_level_channel(&cctx, state, channel).await,
                None => reply_usage(&cctx, "levelchannelset <channel>").await,
            },
            "afk" => {
                let reason = if args.is_empty() {
                    None
                } else {
                    Some(args.join(" "))
                };
                commands::afk(&cctx, state, reason.as_deref()).await
            }
            "rewards" => commands::rewards_list(&cctx).await,
            "modstats" => {
                let target = args.first().and_then(|a| parse_user_arg(a));
                commands::mod_stats(&cctx, state, target).await
            }
            _ => Ok(Outcome::Rejected),
        }?;

        // Denied or invalid invocations must leave the moderation log alone.
        if outcome == Outcome::Completed {
            state.record_mod_action(guild_id, msg.author.id, ActionKind::Command);
        }
        Ok(())
    }
}

async fn reply_usage(cctx: &MessageContext<'_>, usage: &str) -> crate::Result<Outcome> {
    cctx.reply(&format!("Usage: {usage}")).await?;
    Ok(Outcome::Rejected)
}

/// Rolls passive XP for one eligible message, gated by the per-(guild, user)
/// cooldown, and hands any level transition to the reward notifier.
async fn grant_passive_xp(
    state: &mut AppState,
    gateway: &dyn ChatGateway,
    guild: GuildId,
    user: UserId,
) {
    if !state.passive_xp_allowed(guild, user, Utc::now().timestamp()) {
        return;
    }
    let amount = rand::thread_rng().gen_range(PASSIVE_XP_MIN..=PASSIVE_XP_MAX) as i64;
    if let Some(up) = state.add_xp(guild, user, amount) {
        let channel = state.level_channel_of(guild);
        rewards::on_level_up(gateway, guild, user, channel, up).await;
    }
}

fn parse_user_amount(args: &[&str]) -> Option<(serenity::model::prelude::UserId, i64)> {
    let user = parse_user_arg(args.first()?)?;
    let amount = args.get(1)?.parse::<i64>().ok()?;
    Some((user, amount))
}

fn is_image(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Seconds a user has been AFK, judged from the persisted ISO timestamp.
fn afk_elapsed_secs(since: &str) -> i64 {
    DateTime::parse_from_rfc3339(since)
        .map(|since| (Utc::now() - since.with_timezone(&Utc)).num_seconds())
        .unwrap_or(0)
}

#[async_trait]
impl EventHandler for MainBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        let mut wlock = ctx.data.write().await;
        let state: &mut AppState = wlock
            .get_mut::<AppStateKey>()
            .expect("AppState missing from the typemap");

        if let Err(e) = state.load_afk_table(&self.pool).await {
            warn!(error = %e, "failed to load the AFK table");
        }
        for guild in &ready.guilds {
            self.warm_guild(state, guild.id).await;
        }
        info!(
            name = %ready.user.name,
            guilds = ready.guilds.len(),
            "bot is at your service"
        );
    }

    async fn guild_create(&self, ctx: Context, guild: Guild, _is_new: bool) {
        let mut wlock = ctx.data.write().await;
        let state: &mut AppState = wlock
            .get_mut::<AppStateKey>()
            .expect("AppState missing from the typemap");
        if self.warm_guild(state, guild.id).await {
            info!(guild = guild.id.0, name = %guild.name, "guild warmed");
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        let gateway = SerenityGateway::new(Arc::clone(&ctx.http));

        let mut wlock = ctx.data.write().await;
        let state: &mut AppState = wlock
            .get_mut::<AppStateKey>()
            .expect("AppState missing from the typemap");
        if !self.warm_guild(state, guild_id).await {
            return;
        }

        if let Some(entry) = state.clear_afk(msg.author.id) {
            let content = MessageBuilder::new()
                .mention(&msg.author)
                .push(format!(
                    " Welcome back! You were AFK for {}: {}",
                    format_duration(afk_elapsed_secs(&entry.since)),
                    entry.reason
                ))
                .build();
            if let Err(e) = msg.channel_id.say(&ctx.http, &content).await {
                error!(error = %e, "failed to send the welcome-back notice");
            }
        }

        for user in &msg.mentions {
            if let Some(entry) = state.afk_entry(user.id) {
                let note = format!("**{}** is AFK: {} (since {})", user.name, entry.reason, entry.since);
                if let Err(e) = msg.channel_id.say(&ctx.http, &note).await {
                    error!(error = %e, "failed to send the AFK notice");
                }
            }
        }

        // Command messages accrue passive XP like any other message.
        grant_passive_xp(state, &gateway, guild_id, msg.author.id).await;

        let prefix = state.prefix_of(guild_id).to_owned();
        if let Some(rest) = msg.content.strip_prefix(&prefix) {
            if let Err(e) = self
                .dispatch(&ctx, &msg, guild_id, state, &gateway, rest)
                .await
            {
                error!(error = %e, content = %msg.content, "command failed");
                if let Err(e) = msg.channel_id.say(&ctx.http, "Something went wrong.").await {
                    error!(error = %e, "failed to send the error notice");
                }
            }
        }
    }

    async fn message_delete(
        &self,
        ctx: Context,
        channel_id: ChannelId,
        deleted_message_id: MessageId,
        guild_id: Option<GuildId>,
    ) {
        let Some(guild_id) = guild_id else {
            return;
        };
        // Content of the deleted message is only available while it is still
        // in the local message cache.
        let Some(cached) = ctx.cache.message(channel_id, deleted_message_id) else {
            return;
        };
        let Some(attachment) = cached.attachments.iter().find(|a| is_image(&a.filename)) else {
            return;
        };
        let entry = DeletedMedia {
            author: cached.author.tag(),
            content: cached.content.clone(),
            media_url: attachment.url.clone(),
            timestamp: Utc::now().to_rfc3339(),
        };

        let mut wlock = ctx.data.write().await;
        let state: &mut AppState = wlock
            .get_mut::<AppStateKey>()
            .expect("AppState missing from the typemap");
        if self.warm_guild(state, guild_id).await {
            state.record_deleted_media(guild_id, entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use serenity::model::prelude::RoleId;

    use crate::persist::PersistHandle;

    use super::*;

    struct SilentGateway;

    #[async_trait]
    impl ChatGateway for SilentGateway {
        async fn send_message(&self, _: ChannelId, _: &str) -> crate::Result<()> {
            Ok(())
        }

        async fn ensure_role(&self, _: GuildId, _: &str) -> crate::Result<RoleId> {
            Ok(RoleId(1))
        }

        async fn grant_role(&self, _: GuildId, _: UserId, _: RoleId) -> crate::Result<()> {
            Ok(())
        }

        async fn member_display_name(&self, _: GuildId, user: UserId) -> crate::Result<String> {
            Ok(format!("user-{}", user.0))
        }
    }

    #[tokio::test]
    async fn passive_grants_roll_once_per_cooldown_window() {
        let (persist, _rx) = PersistHandle::pair(64);
        let mut state = AppState::new("!".to_owned(), persist);
        let (guild, user) = (GuildId(1), UserId(2));

        grant_passive_xp(&mut state, &SilentGateway, guild, user).await;
        let first = state.xp_of(guild, user);
        assert!((15..=25).contains(&first));

        // Back-to-back messages are inside the cooldown window.
        grant_passive_xp(&mut state, &SilentGateway, guild, user).await;
        assert_eq!(state.xp_of(guild, user), first);
    }

    #[test]
    fn image_filenames_are_detected_case_insensitively() {
        assert!(is_image("photo.PNG"));
        assert!(is_image("anim.gif"));
        assert!(!is_image("notes.txt"));
        assert!(!is_image("png"));
    }

    #[test]
    fn afk_elapsed_tolerates_garbage_timestamps() {
        assert_eq!(afk_elapsed_secs("not-a-timestamp"), 0);
        let recent = Utc::now().to_rfc3339();
        assert!(afk_elapsed_secs(&recent) >= 0);
    }

    #[test]
    fn user_amount_args_parse_together() {
        assert_eq!(
            parse_user_amount(&["<@5>", "100"]),
            Some((serenity::model::prelude::UserId(5), 100))
        );
        assert_eq!(parse_user_amount(&["<@5>"]), None);
        assert_eq!(parse_user_amount(&["<@5>", "lots"]), None);
    }
}
