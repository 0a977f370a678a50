//! Level-reward side effects.
//!
//! There is no ledger of granted rewards: granting a role is set-membership
//! on the platform side, so re-granting after a second threshold crossing is
//! harmless. Gateway failures are logged and never revert the XP mutation.

use serenity::model::prelude::{ChannelId, GuildId, UserId};
use serenity::utils::MessageBuilder;
use tracing::error;

use crate::gateway::ChatGateway;

use super::LevelUp;

pub(crate) const LEVEL_REWARDS: &[(u32, &str)] = &[(5, "VIP"), (10, "Premium"), (20, "Moderator")];

pub(crate) fn reward_for(level: u32) -> Option<&'static str> {
    LEVEL_REWARDS
        .iter()
        .find(|(l, _)| *l == level)
        .map(|(_, name)| *name)
}

/// Grants the reward for every level crossed by `up` and posts one
/// notification to the configured level channel. With no channel configured
/// the rewards are still granted, silently.
pub(crate) async fn on_level_up(
    gateway: &dyn ChatGateway,
    guild: GuildId,
    user: UserId,
    level_channel: Option<ChannelId>,
    up: LevelUp,
) {
    let mut unlocked: Vec<&'static str> = Vec::new();
    for level in (up.old + 1)..=up.new {
        let Some(name) = reward_for(level) else {
            continue;
        };
        let role = match gateway.ensure_role(guild, name).await {
            Ok(role) => role,
            Err(e) => {
                error!(role = name, error = %e, "failed to ensure reward role");
                continue;
            }
        };
        match gateway.grant_role(guild, user, role).await {
            Ok(()) => unlocked.push(name),
            Err(e) => error!(role = name, error = %e, "failed to grant reward role"),
        }
    }

    let Some(channel) = level_channel else {
        return;
    };
    let content = {
        let mut builder = MessageBuilder::new();
        builder
            .push("🎉 ")
            .mention(&user)
            .push(format!(" reached **Level {}**!", up.new));
        for name in &unlocked {
            builder.push(format!("\nUnlocked **{name}** role!"));
        }
        builder.build()
    };
    if let Err(e) = gateway.send_message(channel, &content).await {
        error!(error = %e, "failed to send level-up notification");
    }
}
