//! Abstract reply surface for command handlers.
//!
//! Handlers never see a concrete platform call shape; they get a
//! [`CommandContext`]. [`MessageContext`] is the prefix-message adapter; a
//! slash-interaction twin would implement the same trait.

use serenity::async_trait;
use serenity::model::prelude::{GuildId, Message, Permissions, UserId};
use serenity::prelude::Context;

#[async_trait]
pub(crate) trait CommandContext: Send + Sync {
    fn guild_id(&self) -> GuildId;
    fn author_id(&self) -> UserId;
    async fn has_permission(&self, perm: Permissions) -> bool;
    async fn reply(&self, content: &str) -> crate::Result<()>;
}

pub(crate) struct MessageContext<'a> {
    pub(crate) ctx: &'a Context,
    pub(crate) msg: &'a Message,
    pub(crate) guild_id: GuildId,
}

#[async_trait]
impl CommandContext for MessageContext<'_> {
    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    fn author_id(&self) -> UserId {
        self.msg.author.id
    }

    async fn has_permission(&self, perm: Permissions) -> bool {
        let Ok(member) = self.msg.member(self.ctx).await else {
            return false;
        };
        member
            .permissions(&self.ctx.cache)
            .map(|perms| perms.contains(perm))
            .unwrap_or(false)
    }

    async fn reply(&self, content: &str) -> crate::Result<()> {
        self.msg.channel_id.say(&self.ctx.http, content).await?;
        Ok(())
    }
}
