//! Abstract capability set the core needs from the chat platform.
//!
//! The core only ever talks to [`ChatGateway`]; the serenity adapter below is
//! the single place that knows about Discord's HTTP surface. Tests substitute
//! a mock.

use std::sync::Arc;

use rand::Rng;
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::prelude::{ChannelId, GuildId, RoleId, UserId};

#[async_trait]
pub(crate) trait ChatGateway: Send + Sync {
    async fn send_message(&self, channel: ChannelId, content: &str) -> crate::Result<()>;

    /// Returns the guild role named `name`, creating it if absent.
    async fn ensure_role(&self, guild: GuildId, name: &str) -> crate::Result<RoleId>;

    /// Grants `role` to `user`. Set-membership on the platform side, so
    /// repeated grants are no-ops.
    async fn grant_role(&self, guild: GuildId, user: UserId, role: RoleId) -> crate::Result<()>;

    async fn member_display_name(&self, guild: GuildId, user: UserId) -> crate::Result<String>;
}

pub(crate) struct SerenityGateway {
    http: Arc<Http>,
}

impl SerenityGateway {
    pub(crate) fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChatGateway for SerenityGateway {
    async fn send_message(&self, channel: ChannelId, content: &str) -> crate::Result<()> {
        channel.say(&self.http, content).await?;
        Ok(())
    }

    async fn ensure_role(&self, guild: GuildId, name: &str) -> crate::Result<RoleId> {
        let roles = guild.roles(&self.http).await?;
        if let Some((role_id, _)) = roles.iter().find(|(_, role)| role.name == name) {
            return Ok(*role_id);
        }
        let colour: u64 = rand::thread_rng().gen_range(0..0xFF_FFFF);
        let role = guild
            .create_role(&self.http, |r| r.name(name).colour(colour))
            .await?;
        Ok(role.id)
    }

    async fn grant_role(&self, guild: GuildId, user: UserId, role: RoleId) -> crate::Result<()> {
        self.http
            .add_member_role(guild.0, user.0, role.0, Some("Level reward"))
            .await?;
        Ok(())
    }

    async fn member_display_name(&self, guild: GuildId, user: UserId) -> crate::Result<String> {
        let member = guild.member(Arc::clone(&self.http), user).await?;
        Ok(member.display_name().to_string())
    }
}
