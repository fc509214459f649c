//! Process logging: console plus a log file truncated on every start.
//!
//! Console verbosity is INFO (DEBUG with `--debug`), overridable through
//! `MRBOT_LOG`. The file always receives DEBUG. Other crates are capped at
//! WARN on both outputs.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::prelude::*;

/// Environment variable overriding the console level
pub const LOG_ENV: &str = "MRBOT_LOG";

/// Log target of this crate
const OWN_TARGET: &str = "mrbot";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Cannot open log file '{}': {source}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Logging already initialized")]
    AlreadyInitialized,
}

fn parse_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        "off" => Some(LevelFilter::OFF),
        _ => None,
    }
}

/// Console level from the debug flag and an optional override
fn console_level(debug: bool, env_override: Option<&str>) -> LevelFilter {
    env_override
        .and_then(parse_level)
        .unwrap_or(if debug { LevelFilter::DEBUG } else { LevelFilter::INFO })
}

fn targets(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(std::cmp::min(LevelFilter::WARN, level))
        .with_target(OWN_TARGET, level)
}

/// Install the global subscriber.
pub fn init(log_file: &Path, debug: bool) -> Result<(), LoggingError> {
    let file = File::create(log_file).map_err(|source| LoggingError::LogFile {
        path: log_file.to_path_buf(),
        source,
    })?;
    let level = console_level(debug, std::env::var(LOG_ENV).ok().as_deref());

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(targets(level));
    let file = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(targets(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}
