//! Command-line interface of the `mrbot` launcher

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::bot::{BotOptions, DEFAULT_OWNER_ID};
use crate::config::{DsnSource, FragmentSelector, JsonSources};

#[derive(Debug, Parser)]
#[command(name = "mrbot")]
#[command(about = "MrBot chat bot", version)]
pub struct Cli {
    /// File that exists while commands are running
    #[arg(long, env = "BUSY_FILE")]
    pub busy_file: Option<PathBuf>,

    /// Command prefix (repeatable)
    #[arg(long = "command-prefix", default_value = "!")]
    pub command_prefixes: Vec<String>,

    /// User id of the bot owner
    #[arg(long, default_value_t = DEFAULT_OWNER_ID)]
    pub owner_id: u64,

    /// Load only these extensions (repeatable)
    #[arg(long = "ext")]
    pub extensions: Option<Vec<String>>,

    /// Log file, truncated on start
    #[arg(long, default_value = "mrbot.log")]
    pub log_file: PathBuf,

    /// Verbose console logging
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub source: ConfigSource,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSource {
    /// Load configuration from JSON files
    JsonConfig {
        /// Secrets file (repeatable, later files win)
        #[arg(short, long = "secrets", required = true)]
        secrets: Vec<PathBuf>,

        /// Paths file (repeatable, later files win)
        #[arg(short, long = "paths", required = true)]
        paths: Vec<PathBuf>,

        /// Guild file (repeatable)
        #[arg(short, long = "guild")]
        guilds: Vec<PathBuf>,
    },

    /// Load configuration from the config database
    PsqlConfig {
        #[command(flatten)]
        dsn: DsnArgs,

        /// Extra fragment applied on top of main, as <type>:<name> (repeatable)
        #[arg(short = 'e', long = "extra")]
        extras: Vec<FragmentSelector>,
    },
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct DsnArgs {
    /// Database DSN
    #[arg(short = 'c', long)]
    pub dsn: Option<String>,

    /// Read the DSN from CONFIG_DSN
    #[arg(long)]
    pub env: bool,

    /// Read the DSN from a file
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,
}

impl DsnArgs {
    pub fn source(&self) -> DsnSource {
        match (&self.dsn, &self.file) {
            (Some(dsn), _) => DsnSource::Literal(dsn.clone()),
            (None, Some(path)) => DsnSource::File(path.clone()),
            (None, None) => DsnSource::Env,
        }
    }
}

impl Cli {
    pub fn bot_options(&self) -> BotOptions {
        BotOptions {
            busy_file: self.busy_file.clone(),
            command_prefixes: self.command_prefixes.clone(),
            owner_id: self.owner_id,
            extension_override: self.extensions.clone(),
            log_file: self.log_file.clone(),
            debug: self.debug,
        }
    }
}

impl ConfigSource {
    /// JSON files to read, for `json-config`
    pub fn json_sources(&self) -> Option<JsonSources> {
        match self {
            Self::JsonConfig {
                secrets,
                paths,
                guilds,
            } => Some(JsonSources {
                secrets: secrets.clone(),
                paths: paths.clone(),
                guilds: guilds.clone(),
            }),
            Self::PsqlConfig { .. } => None,
        }
    }
}
