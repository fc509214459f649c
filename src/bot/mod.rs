//! Bot runtime handle
//!
//! `Bot` owns the frozen configuration and the launcher options. Components
//! receive what they need from it explicitly; there is no process-global bot.

mod busy;
mod context;

pub use busy::{CommandGuard, CommandTracker};
pub use context::{CommandContext, IncomingMessage};

use regex_lite::Regex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EffectiveConfig;
use crate::signal::ShutdownSignal;

/// Default owner of the bot
pub const DEFAULT_OWNER_ID: u64 = 227847073607712768;

/// Extensions with this prefix are skipped unless named explicitly
pub const DISABLED_PREFIX: &str = "disabled_";

/// How long close waits for running commands
pub const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Errors raised by the bot runtime
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("No command prefix configured")]
    NoPrefix,

    #[error("Invalid command prefix pattern: {0}")]
    Prefix(#[from] regex_lite::Error),

    #[error("Command is only available in approved guilds (guild: {0:?})")]
    UnapprovedGuild(Option<u64>),

    #[error("Busy file '{}': {source}", .path.display())]
    BusyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Launcher options that are not part of the layered config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotOptions {
    pub busy_file: Option<PathBuf>,
    pub command_prefixes: Vec<String>,
    pub owner_id: u64,
    /// Load exactly these extensions instead of discovering them
    pub extension_override: Option<Vec<String>>,
    pub log_file: PathBuf,
    pub debug: bool,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            busy_file: None,
            command_prefixes: vec!["!".to_string()],
            owner_id: DEFAULT_OWNER_ID,
            extension_override: None,
            log_file: PathBuf::from("mrbot.log"),
            debug: false,
        }
    }
}

/// How the brains service is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrainsEndpoint {
    UnixSocket(PathBuf),
    Http(String),
}

impl BrainsEndpoint {
    /// Absolute paths are Unix sockets; anything else is an HTTP base URL.
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() {
            None
        } else if value.starts_with('/') {
            Some(Self::UnixSocket(PathBuf::from(value)))
        } else {
            Some(Self::Http(value.trim_end_matches('/').to_string()))
        }
    }

    /// URL for an API path; socket requests use a placeholder host.
    pub fn url(&self, path: &str) -> String {
        match self {
            Self::UnixSocket(_) => format!("http://localhost{}", path),
            Self::Http(base) => format!("{}{}", base, path),
        }
    }
}

/// Which extensions to load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionPlan {
    pub load: Vec<String>,
    pub skipped: Vec<String>,
}

/// How the bot stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
    Graceful,
    Immediate,
}

#[derive(Debug)]
pub struct Bot {
    config: Arc<EffectiveConfig>,
    options: BotOptions,
    prefix_guard: Regex,
    brains: Option<BrainsEndpoint>,
    commands: Arc<CommandTracker>,
    closed: AtomicBool,
}

impl Bot {
    pub fn new(config: Arc<EffectiveConfig>, options: BotOptions) -> Result<Self, BotError> {
        if options.command_prefixes.iter().all(|p| p.is_empty()) {
            return Err(BotError::NoPrefix);
        }
        let group = options
            .command_prefixes
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| regex_lite::escape(&p.repeat(2)))
            .collect::<Vec<_>>()
            .join("|");
        let prefix_guard = Regex::new(&format!("^({})", group))?;
        let brains = config
            .paths()
            .brains
            .as_deref()
            .and_then(BrainsEndpoint::parse);
        let commands = Arc::new(CommandTracker::new(options.busy_file.clone()));

        Ok(Self {
            config,
            options,
            prefix_guard,
            brains,
            commands,
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    /// Shared handle to the config for long-lived components
    pub fn shared_config(&self) -> Arc<EffectiveConfig> {
        Arc::clone(&self.config)
    }

    pub fn options(&self) -> &BotOptions {
        &self.options
    }

    pub fn brains(&self) -> Option<&BrainsEndpoint> {
        self.brains.as_ref()
    }

    /// Messages starting with a doubled prefix (`!!`) are not commands
    pub fn should_ignore(&self, content: &str) -> bool {
        self.prefix_guard.is_match(content)
    }

    /// Build the command context for a message, or `None` if the bot must
    /// not react to it at all.
    pub fn context_for<'a>(&'a self, message: &IncomingMessage) -> Option<CommandContext<'a>> {
        if message.author_is_bot || self.should_ignore(&message.content) {
            return None;
        }
        Some(CommandContext::from_message(self, message))
    }

    /// Track a running command for the busy indicator
    pub fn begin_command(&self) -> Result<CommandGuard, BotError> {
        self.commands.begin()
    }

    pub fn running_commands(&self) -> usize {
        self.commands.running()
    }

    /// Where an uploaded file is stored
    pub fn upload_path(&self, file_name: &str) -> Option<PathBuf> {
        self.config
            .paths()
            .upload
            .as_ref()
            .map(|dir| dir.join(file_name))
    }

    /// Public URL of an uploaded file
    pub fn upload_url(&self, file_name: &str) -> Option<String> {
        self.config
            .paths()
            .hostname
            .as_ref()
            .map(|host| format!("{}/discord/{}", host.trim_end_matches('/'), file_name))
    }

    /// Decide which of the `available` extensions to load
    pub fn extension_plan(&self, available: &[String]) -> ExtensionPlan {
        if let Some(names) = &self.options.extension_override {
            return ExtensionPlan {
                load: names.clone(),
                skipped: Vec::new(),
            };
        }
        let (skipped, load): (Vec<String>, Vec<String>) = available
            .iter()
            .cloned()
            .partition(|name| name.starts_with(DISABLED_PREFIX));
        ExtensionPlan { load, skipped }
    }

    /// Block until shutdown is requested, then close.
    pub fn run(&self, signal: &ShutdownSignal) -> ShutdownKind {
        tracing::info!(
            prefixes = ?self.options.command_prefixes,
            owner_id = self.options.owner_id,
            guilds = self.config.guilds().len(),
            brains = ?self.brains,
            "bot ready"
        );
        signal.wait();

        let drained = signal.wait_until(CLOSE_GRACE_PERIOD, || self.running_commands() == 0);
        if !drained {
            tracing::warn!(
                running = self.running_commands(),
                "closing with commands still running"
            );
        }
        self.close();

        if signal.state().is_immediate_exit() {
            ShutdownKind::Immediate
        } else {
            ShutdownKind::Graceful
        }
    }

    /// Release resources; only the first call does anything.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("---------- Cleanup start ----------");
        self.commands.remove_busy_file();
        tracing::info!("---------- Cleanup done -----------");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Bot {
    fn drop(&mut self) {
        self.close();
    }
}
