//! Named fragment sources
//!
//! A source hands out fragments by `(kind, name)`. The config database is the
//! production source; tests use an in-memory one.

use async_trait::async_trait;

use super::error::ConfigError;
use super::fragment::{ConfigFragment, FragmentKind};

#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Read one named fragment; a missing one is `SourceUnavailable`.
    async fn read(&self, kind: FragmentKind, name: &str) -> Result<ConfigFragment, ConfigError>;

    /// Every fragment of `kind`, ordered by name
    async fn read_all(&self, kind: FragmentKind) -> Result<Vec<ConfigFragment>, ConfigError>;

    /// Release connections. Called once, whether or not reading succeeded.
    async fn close(&self);
}
