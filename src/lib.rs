//! MrBot - chat bot launcher with layered configuration
//!
//! Configuration is assembled at startup from secrets, paths and guild
//! fragments, read from JSON files or the `config` database table, and handed
//! to the bot runtime as one immutable [`EffectiveConfig`].

pub mod bot;
pub mod cli;
pub mod config;
pub mod logging;
pub mod signal;

pub use bot::{Bot, BotError, BotOptions, CommandContext, IncomingMessage, ShutdownKind};
pub use config::{
    ConfigError, ConfigFragment, EffectiveConfig, FragmentKind, FragmentSelector, MergedConfig,
};
pub use signal::ShutdownSignal;
