//! PostgreSQL fragment source
//!
//! Fragments can live as rows of the `config` table (see
//! `migrations/0001_create_config_table.sql`), one row per `(type, name)`
//! holding the fragment object in a JSONB column.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use super::error::ConfigError;
use super::fragment::{ConfigFragment, FragmentKind, FragmentOrigin, FragmentSelector};
use super::source::FragmentSource;

/// Table holding configuration fragments
pub const CONFIG_TABLE: &str = "config";

/// Connection attempts give up after this long
const CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// Read-only access to the configuration table
pub struct PsqlFragmentStore {
    pool: PgPool,
}

impl PsqlFragmentStore {
    /// Connect using a PostgreSQL connection string
    pub async fn connect(dsn: &str) -> Result<Self, ConfigError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECONDS))
            .connect(dsn)
            .await
            .map_err(|e| {
                ConfigError::unavailable(CONFIG_TABLE, format!("connection failed: {}", e))
            })?;
        tracing::info!(table = CONFIG_TABLE, "connected to config database");
        Ok(Self { pool })
    }
}

#[async_trait]
impl FragmentSource for PsqlFragmentStore {
    async fn read(&self, kind: FragmentKind, name: &str) -> Result<ConfigFragment, ConfigError> {
        let selector = FragmentSelector::new(kind, name);
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT data FROM config WHERE type = $1 AND name = $2")
                .bind(kind.as_str())
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ConfigError::unavailable(selector.to_string(), e))?;

        match row {
            Some((data,)) => fragment_from_row(kind, name, data),
            None => Err(ConfigError::unavailable(
                selector.to_string(),
                format!("no such row in table '{}'", CONFIG_TABLE),
            )),
        }
    }

    async fn read_all(&self, kind: FragmentKind) -> Result<Vec<ConfigFragment>, ConfigError> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT name, data FROM config WHERE type = $1 ORDER BY name")
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ConfigError::unavailable(format!("{}:*", kind), e))?;

        rows.into_iter()
            .map(|(name, data)| fragment_from_row(kind, &name, data))
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Turn one `config` row into a fragment.
pub fn fragment_from_row(
    kind: FragmentKind,
    name: &str,
    data: Value,
) -> Result<ConfigFragment, ConfigError> {
    let raw = serde_json::to_vec(&data)
        .map_err(|e| ConfigError::unavailable(format!("{}:{}", kind, name), e))?;
    let fragment = ConfigFragment::from_value(kind, name, data)?.with_provenance(
        FragmentOrigin::Database,
        format!("{}:{}:{}", CONFIG_TABLE, kind, name),
        &raw,
    );
    tracing::debug!(
        fragment = %fragment.selector(),
        keys = fragment.data().len(),
        "read config row"
    );
    Ok(fragment)
}
