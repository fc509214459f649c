//! Command context
//!
//! Everything a command handler may look at, declared up front: who sent the
//! command, where, the parsed command line, and the bot it runs on.

use mrbot_guild::GuildDef;

use super::{Bot, BotError};
use crate::config::EffectiveConfig;

/// A message as delivered by the chat gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub author_id: u64,
    pub author_is_bot: bool,
    /// `None` for direct messages
    pub guild_id: Option<u64>,
    pub channel: String,
    pub content: String,
}

/// Context handed to command handlers
#[derive(Debug)]
pub struct CommandContext<'a> {
    bot: &'a Bot,
    pub guild_id: Option<u64>,
    pub author_id: u64,
    pub channel: String,
    pub prefix: Option<String>,
    pub command: Option<String>,
    pub args: Vec<String>,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn from_message(bot: &'a Bot, message: &IncomingMessage) -> Self {
        let mut ctx = Self {
            bot,
            guild_id: message.guild_id,
            author_id: message.author_id,
            channel: message.channel.clone(),
            prefix: None,
            command: None,
            args: Vec::new(),
        };

        let matched = bot
            .options()
            .command_prefixes
            .iter()
            .find(|p| !p.is_empty() && message.content.starts_with(p.as_str()));
        if let Some(prefix) = matched {
            let mut words = message.content[prefix.len()..].split_whitespace();
            ctx.command = words.next().map(str::to_string);
            ctx.args = words.map(str::to_string).collect();
            ctx.prefix = Some(prefix.clone());
        }
        ctx
    }

    pub fn bot(&self) -> &'a Bot {
        self.bot
    }

    pub fn config(&self) -> &'a EffectiveConfig {
        self.bot.config()
    }

    /// Whether the message invoked a command at all
    pub fn is_command(&self) -> bool {
        self.command.is_some()
    }

    pub fn is_owner(&self) -> bool {
        self.author_id == self.bot.options().owner_id
    }

    /// Fail unless the command runs in an approved guild
    pub fn ensure_approved_guild(&self) -> Result<(), BotError> {
        match self.guild_id {
            Some(id) if self.config().is_approved_guild(id) => Ok(()),
            _ => Err(BotError::UnapprovedGuild(self.guild_id)),
        }
    }

    /// Definition of the guild the command runs in, if one is configured
    pub fn guild_def(&self) -> Option<&'a GuildDef> {
        self.guild_id.and_then(|id| self.config().guild(id))
    }
}
