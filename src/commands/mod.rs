//! Platform-agnostic command intents.
//!
//! Each handler validates, mutates the injected [`AppState`], and replies
//! through the [`CommandContext`]. Permission denials and validation failures
//! reply without mutating anything, and report [`Outcome::Rejected`] so the
//! dispatcher can skip its own bookkeeping too.

use serenity::model::prelude::{ChannelId, Permissions, UserId};

use crate::app_state::levels;
use crate::app_state::rewards::{self, LEVEL_REWARDS};
use crate::app_state::AppState;
use crate::gateway::ChatGateway;
use crate::immut_data::consts::MAX_PREFIX_LEN;
use crate::util::progress_bar;

pub(crate) mod context;

use context::CommandContext;

/// Whether a handler ran to completion or bounced the request back to the
/// user without touching any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Completed,
    Rejected,
}

async fn deny(cctx: &dyn CommandContext, perm: &str) -> crate::Result<Outcome> {
    cctx.reply(&format!("Permission denied: requires `{perm}`."))
        .await?;
    Ok(Outcome::Rejected)
}

pub(crate) async fn set_prefix(
    cctx: &dyn CommandContext,
    state: &mut AppState,
    new_prefix: &str,
) -> crate::Result<Outcome> {
    if !cctx.has_permission(Permissions::MANAGE_GUILD).await {
        return deny(cctx, "Manage Server").await;
    }
    let chars = new_prefix.chars().count();
    if chars == 0 || chars > MAX_PREFIX_LEN {
        cctx.reply(&format!("Prefix must be 1 to {MAX_PREFIX_LEN} characters."))
            .await?;
        return Ok(Outcome::Rejected);
    }
    state.set_prefix(cctx.guild_id(), new_prefix.to_owned());
    cctx.reply(&format!("Prefix updated to `{new_prefix}`."))
        .await?;
    Ok(Outcome::Completed)
}

pub(crate) async fn rank(
    cctx: &dyn CommandContext,
    state: &AppState,
    gateway: &dyn ChatGateway,
    target: Option<UserId>,
) -> crate::Result<Outcome> {
    let guild = cctx.guild_id();
    let user = target.unwrap_or_else(|| cctx.author_id());
    let xp = state.xp_of(guild, user);
    let p = levels::progress(xp as i64);
    let name = gateway
        .member_display_name(guild, user)
        .await
        .unwrap_or_else(|_| format!("<@{}>", user.0));
    cctx.reply(&format!(
        "**{name}** — Level {} — {}/{} XP\n{} {:.1}%",
        p.level,
        p.xp_into_level,
        p.xp_into_level + p.xp_to_next,
        progress_bar(p.percent, 10),
        p.percent,
    ))
    .await?;
    Ok(Outcome::Completed)
}

pub(crate) async fn leaderboard(
    cctx: &dyn CommandContext,
    state: &AppState,
    gateway: &dyn ChatGateway,
) -> crate::Result<Outcome> {
    let guild = cctx.guild_id();
    let rows = state.leaderboard(guild);
    if rows.is_empty() {
        cctx.reply("No rankings yet.").await?;
        return Ok(Outcome::Completed);
    }
    let mut lines = Vec::with_capacity(rows.len());
    for (i, (user, xp)) in rows.iter().enumerate() {
        let name = gateway
            .member_display_name(guild, *user)
            .await
            .unwrap_or_else(|_| format!("<@{}>", user.0));
        lines.push(format!(
            "{}. **{name}** - {xp} XP (Lv. {})",
            i + 1,
            levels::level_for_xp(*xp as i64)
        ));
    }
    cctx.reply(&lines.join("\n")).await?;
    Ok(Outcome::Completed)
}

pub(crate) async fn xp_add(
    cctx: &dyn CommandContext,
    state: &mut AppState,
    gateway: &dyn ChatGateway,
    target: UserId,
    amount: i64,
) -> crate::Result<Outcome> {
    if !cctx.has_permission(Permissions::MANAGE_GUILD).await {
        return deny(cctx, "Manage Server").await;
    }
    if amount < 1 {
        cctx.reply("Amount must be positive.").await?;
        return Ok(Outcome::Rejected);
    }
    let guild = cctx.guild_id();
    let up = state.add_xp(guild, target, amount);
    let xp = state.xp_of(guild, target);
    cctx.reply(&format!(
        "Added {amount} XP to <@{}>. Total: {xp} XP (Lv. {}).",
        target.0,
        levels::level_for_xp(xp as i64)
    ))
    .await?;
    if let Some(up) = up {
        let channel = state.level_channel_of(guild);
        rewards::on_level_up(gateway, guild, target, channel, up).await;
    }
    Ok(Outcome::Completed)
}

pub(crate) async fn xp_remove(
    cctx: &dyn CommandContext,
    state: &mut AppState,
    target: UserId,
    amount: i64,
) -> crate::Result<Outcome> {
    if !cctx.has_permission(Permissions::MANAGE_GUILD).await {
        return deny(cctx, "Manage Server").await;
    }
    if amount < 1 {
        cctx.reply("Amount must be positive.").await?;
        return Ok(Outcome::Rejected);
    }
    let guild = cctx.guild_id();
    let current = state.xp_of(guild, target) as i64;
    state.set_xp(guild, target, current.saturating_sub(amount));
    let xp = state.xp_of(guild, target);
    cctx.reply(&format!(
        "Removed {amount} XP from <@{}>. Total: {xp} XP (Lv. {}).",
        target.0,
        levels::level_for_xp(xp as i64)
    ))
    .await?;
    Ok(Outcome::Completed)
}

pub(crate) async fn level_set(
    cctx: &dyn CommandContext,
    state: &mut AppState,
    target: UserId,
    level: i64,
) -> crate::Result<Outcome> {
    if !cctx.has_permission(Permissions::MANAGE_GUILD).await {
        return deny(cctx, "Manage Server").await;
    }
    let Ok(level) = u32::try_from(level) else {
        cctx.reply("Level must be non-negative.").await?;
        return Ok(Outcome::Rejected);
    };
    // Reject levels whose XP threshold no longer fits the store's i64.
    let Ok(xp) = i64::try_from(levels::xp_for_level(level)) else {
        cctx.reply("Level is too large.").await?;
        return Ok(Outcome::Rejected);
    };
    state.set_xp(cctx.guild_id(), target, xp);
    cctx.reply(&format!("<@{}>'s level set to {level}.", target.0))
        .await?;
    Ok(Outcome::Completed)
}

pub(crate) async fn set_level_channel(
    cctx: &dyn CommandContext,
    state: &mut AppState,
    channel: ChannelId,
) -> crate::Result<Outcome> {
    if !cctx.has_permission(Permissions::MANAGE_GUILD).await {
        return deny(cctx, "Manage Server").await;
    }
    state.set_level_channel(cctx.guild_id(), channel);
    cctx.reply(&format!("Level notifications set to <#{}>.", channel.0))
        .await?;
    Ok(Outcome::Completed)
}

pub(crate) async fn afk(
    cctx: &dyn CommandContext,
    state: &mut AppState,
    reason: Option<&str>,
) -> crate::Result<Outcome> {
    let reason = match reason {
        Some(r) if !r.is_empty() => r,
        _ => "AFK",
    };
    state.set_afk(cctx.author_id(), reason.to_owned());
    cctx.reply(&format!("AFK set: {reason}")).await?;
    Ok(Outcome::Completed)
}

pub(crate) async fn rewards_list(cctx: &dyn CommandContext) -> crate::Result<Outcome> {
    let lines: Vec<String> = LEVEL_REWARDS
        .iter()
        .map(|(level, name)| format!("Level {level}: **{name}** role"))
        .collect();
    cctx.reply(&lines.join("\n")).await?;
    Ok(Outcome::Completed)
}

pub(crate) async fn mod_stats(
    cctx: &dyn CommandContext,
    state: &AppState,
    target: Option<UserId>,
) -> crate::Result<Outcome> {
    let user = target.unwrap_or_else(|| cctx.author_id());
    let lines: Vec<String> = state
        .mod_counts(cctx.guild_id(), user)
        .into_iter()
        .map(|(kind, count)| format!("{}: {count}", kind.as_str()))
        .collect();
    cctx.reply(&format!("Moderation stats for <@{}>:\n{}", user.0, lines.join("\n")))
        .await?;
    Ok(Outcome::Completed)
}
