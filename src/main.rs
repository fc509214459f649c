//! MrBot launcher
//!
//! Entry point for the `mrbot` command-line tool.

use std::process;
use std::sync::Arc;

use clap::Parser;
use mrbot::cli::{Cli, ConfigSource};
use mrbot::config::{self, ConfigError, EffectiveConfig};
use mrbot::signal::{ShutdownSignal, EXIT_CODE_INTERRUPTED};
use mrbot::{logging, Bot, ShutdownKind};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_file, cli.debug) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let config = match load_config(&cli.source) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    tracing::info!(
        sources = config.sources().len(),
        guilds = config.guilds().len(),
        "configuration loaded"
    );
    if cli.debug {
        match config.to_redacted_json() {
            Ok(json) => tracing::debug!("effective configuration:\n{}", json),
            Err(e) => tracing::warn!(error = %e, "cannot render configuration"),
        }
    }

    let bot = match Bot::new(Arc::new(config), cli.bot_options()) {
        Ok(bot) => bot,
        Err(e) => fail(&e),
    };

    let signal = ShutdownSignal::new();
    if let Err(e) = signal.install() {
        fail(&e);
    }

    match bot.run(&signal) {
        ShutdownKind::Graceful => {
            tracing::info!("bot stopped");
        }
        ShutdownKind::Immediate => {
            drop(bot);
            process::exit(EXIT_CODE_INTERRUPTED);
        }
    }
}

fn load_config(source: &ConfigSource) -> Result<EffectiveConfig, ConfigError> {
    match source {
        ConfigSource::JsonConfig { .. } => {
            let sources = source.json_sources().unwrap_or_default();
            config::load_json(&sources)
        }
        ConfigSource::PsqlConfig { dsn, extras } => {
            let dsn = dsn.source().resolve()?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| ConfigError::SourceUnavailable {
                    fragment: "config database".to_string(),
                    reason: format!("cannot start runtime: {}", e),
                })?;
            runtime.block_on(config::load_psql(&dsn, extras))
        }
    }
}

fn fail(error: &dyn std::error::Error) -> ! {
    tracing::error!(error = %error, "startup failed");
    eprintln!("Error: {}", error);
    process::exit(1);
}
