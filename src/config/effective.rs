//! Effective configuration
//!
//! The effective config is assembled once from the merged fragments, checked
//! for the keys the bot cannot start without, and then frozen. It exposes only
//! shared accessors; share it between components as `Arc<EffectiveConfig>`.

use chrono::{DateTime, Utc};
use mrbot_guild::{parse_snowflake, GuildDef};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::fragment::{FragmentKind, FragmentProvenance};
use super::merge::MergedConfig;

/// Keys the bot cannot start without, as `(kind, dotted path)`
pub const REQUIRED_KEYS: &[(FragmentKind, &str)] = &[
    (FragmentKind::Secrets, "token"),
    (FragmentKind::Secrets, "psql.main"),
    (FragmentKind::Paths, "data"),
];

/// Keys that contain secrets and should be redacted
const SECRET_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "private_key",
    "api_key",
    "api-key",
    "credential",
    "psql",
    "dsn",
];

const REDACTED: &str = "[REDACTED]";

/// WebDAV upload target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebDavConfig {
    pub upload_url: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

/// Typed view of the merged `secrets` fragments
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Secrets {
    /// Chat platform authentication token
    pub token: String,

    /// Named PostgreSQL connection strings; `main` is always present
    pub psql: BTreeMap<String, String>,

    #[serde(default, alias = "api-keys")]
    pub api_keys: Map<String, Value>,

    /// Guilds where restricted commands may run
    #[serde(default, deserialize_with = "snowflake_list")]
    pub approved_guilds: Vec<u64>,

    #[serde(default)]
    pub webdav: Option<WebDavConfig>,
}

/// Typed view of the merged `paths` fragments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paths {
    /// Data directory
    pub data: PathBuf,

    /// Directory served to users for uploads
    #[serde(default, deserialize_with = "non_empty")]
    pub upload: Option<PathBuf>,

    /// Brains service: Unix socket path or HTTP base URL
    #[serde(default, deserialize_with = "non_empty")]
    pub brains: Option<String>,

    /// Public base URL for uploaded files
    #[serde(default, deserialize_with = "non_empty")]
    pub hostname: Option<String>,
}

fn snowflake_list<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    raw.iter()
        .map(|v| {
            parse_snowflake(v)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid guild id {}", v)))
        })
        .collect()
}

fn non_empty<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|s| !s.is_empty())
        .map(T::from))
}

/// Effective configuration with provenance
#[derive(Clone)]
pub struct EffectiveConfig {
    loaded_at: DateTime<Utc>,
    secrets: Secrets,
    paths: Paths,
    guilds: BTreeMap<u64, GuildDef>,
    raw_secrets: Map<String, Value>,
    raw_paths: Map<String, Value>,
    raw_guilds: BTreeMap<u64, Map<String, Value>>,
    sources: Vec<FragmentProvenance>,
}

impl EffectiveConfig {
    /// Validate merged fragments and freeze them.
    pub fn assemble(merged: MergedConfig) -> Result<Self, ConfigError> {
        Self::check_required(&merged)?;

        let secrets: Secrets = serde_json::from_value(Value::Object(merged.secrets.clone()))
            .map_err(|e| ConfigError::invalid(FragmentKind::Secrets.as_str(), e))?;
        let paths: Paths = serde_json::from_value(Value::Object(merged.paths.clone()))
            .map_err(|e| ConfigError::invalid(FragmentKind::Paths.as_str(), e))?;

        let mut guilds = BTreeMap::new();
        for (id, data) in &merged.guilds {
            let guild = GuildDef::from_value(&Value::Object(data.clone()))
                .map_err(|e| ConfigError::invalid(format!("guild.{}", id), e))?;
            guilds.insert(*id, guild);
        }

        tracing::info!(
            fragments = merged.sources.len(),
            guilds = guilds.len(),
            approved_guilds = secrets.approved_guilds.len(),
            "effective config assembled"
        );

        Ok(Self {
            loaded_at: Utc::now(),
            secrets,
            paths,
            guilds,
            raw_secrets: merged.secrets,
            raw_paths: merged.paths,
            raw_guilds: merged.guilds,
            sources: merged.sources,
        })
    }

    fn check_required(merged: &MergedConfig) -> Result<(), ConfigError> {
        for (kind, key) in REQUIRED_KEYS {
            let map = match kind {
                FragmentKind::Secrets => &merged.secrets,
                FragmentKind::Paths => &merged.paths,
                FragmentKind::Guild => continue,
            };
            let present = match lookup(map, key) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.is_empty(),
                Some(_) => true,
            };
            if !present {
                return Err(ConfigError::ConfigIncomplete {
                    key: format!("{}.{}", kind, key),
                });
            }
        }
        Ok(())
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn token(&self) -> &str {
        &self.secrets.token
    }

    /// Named PostgreSQL connection string
    pub fn psql_dsn(&self, name: &str) -> Option<&str> {
        self.secrets.psql.get(name).map(String::as_str)
    }

    pub fn secrets(&self) -> &Secrets {
        &self.secrets
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn data_dir(&self) -> &Path {
        &self.paths.data
    }

    pub fn guild(&self, id: u64) -> Option<&GuildDef> {
        self.guilds.get(&id)
    }

    pub fn guilds(&self) -> &BTreeMap<u64, GuildDef> {
        &self.guilds
    }

    pub fn is_approved_guild(&self, id: u64) -> bool {
        self.secrets.approved_guilds.contains(&id)
    }

    /// Look up a merged secrets value by dotted path
    pub fn secret(&self, path: &str) -> Option<&Value> {
        lookup(&self.raw_secrets, path)
    }

    /// Look up a merged paths value by dotted path
    pub fn path(&self, path: &str) -> Option<&Value> {
        lookup(&self.raw_paths, path)
    }

    /// Contributing fragments in merge order
    pub fn sources(&self) -> &[FragmentProvenance] {
        &self.sources
    }

    /// JSON rendering with secret values replaced, safe for logs
    pub fn redacted(&self) -> Value {
        let redact = |map: &Map<String, Value>| {
            let mut value = Value::Object(map.clone());
            redact_recursive(&mut value, false);
            value
        };
        let guilds: Map<String, Value> = self
            .raw_guilds
            .iter()
            .map(|(id, data)| (id.to_string(), redact(data)))
            .collect();
        serde_json::json!({
            "loaded_at": self.loaded_at.to_rfc3339(),
            "secrets": redact(&self.raw_secrets),
            "paths": redact(&self.raw_paths),
            "guilds": guilds,
            "sources": self.sources,
        })
    }

    pub fn to_redacted_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.redacted())
    }
}

impl fmt::Debug for EffectiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EffectiveConfig({})", self.redacted())
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("token", &REDACTED)
            .field("psql", &self.psql.keys().collect::<Vec<_>>())
            .field("api_keys", &self.api_keys.keys().collect::<Vec<_>>())
            .field("approved_guilds", &self.approved_guilds)
            .field("webdav", &self.webdav.as_ref().map(|w| &w.upload_url))
            .finish()
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

fn is_secret_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    SECRET_KEYS.iter().any(|s| key_lower.contains(s))
}

/// Replace secret scalars; everything beneath a secret key is redacted.
fn redact_recursive(value: &mut Value, force: bool) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                redact_recursive(val, force || is_secret_key(key));
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                redact_recursive(val, force);
            }
        }
        Value::Null => {}
        scalar => {
            if force {
                *scalar = Value::String(REDACTED.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fragment::{ConfigFragment, FragmentSelector};
    use serde_json::json;

    fn merged(secrets: Value, paths: Value, guilds: Vec<Value>) -> MergedConfig {
        let mut fragments = vec![
            ConfigFragment::from_value(FragmentKind::Secrets, "main", secrets).unwrap(),
            ConfigFragment::from_value(FragmentKind::Paths, "main", paths).unwrap(),
        ];
        for (i, g) in guilds.into_iter().enumerate() {
            let name = format!("g{}", i);
            fragments.push(ConfigFragment::from_value(FragmentKind::Guild, name, g).unwrap());
        }
        MergedConfig::merge(&fragments, &[] as &[FragmentSelector]).unwrap()
    }

    fn minimal_secrets() -> Value {
        json!({"token": "tok", "psql": {"main": "postgres://bot:pw@localhost/discord"}})
    }

    #[test]
    fn test_assemble_minimal() {
        let config =
            EffectiveConfig::assemble(merged(minimal_secrets(), json!({"data": "/data"}), vec![]))
                .unwrap();

        assert_eq!(config.token(), "tok");
        assert_eq!(config.psql_dsn("main"), Some("postgres://bot:pw@localhost/discord"));
        assert_eq!(config.data_dir(), Path::new("/data"));
        assert!(config.paths().upload.is_none());
        assert!(config.guilds().is_empty());
        assert_eq!(config.sources().len(), 2);
    }

    #[test]
    fn test_missing_token() {
        let err = EffectiveConfig::assemble(merged(
            json!({"psql": {"main": "dsn"}}),
            json!({"data": "/data"}),
            vec![],
        ))
        .unwrap_err();
        match err {
            ConfigError::ConfigIncomplete { key } => assert_eq!(key, "secrets.token"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_token_counts_as_missing() {
        let err = EffectiveConfig::assemble(merged(
            json!({"token": "", "psql": {"main": "dsn"}}),
            json!({"data": "/data"}),
            vec![],
        ))
        .unwrap_err();
        assert!(err.to_string().contains("secrets.token"));
    }

    #[test]
    fn test_missing_psql_main() {
        let err = EffectiveConfig::assemble(merged(
            json!({"token": "t", "psql": {"collector": "dsn"}}),
            json!({"data": "/data"}),
            vec![],
        ))
        .unwrap_err();
        assert!(err.to_string().contains("secrets.psql.main"));
    }

    #[test]
    fn test_missing_data_dir() {
        let err = EffectiveConfig::assemble(merged(
            minimal_secrets(),
            json!({"upload": "/u"}),
            vec![],
        ))
        .unwrap_err();
        match err {
            ConfigError::ConfigIncomplete { key } => assert_eq!(key, "paths.data"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wrong_shape_is_invalid() {
        let err = EffectiveConfig::assemble(merged(
            json!({"token": "t", "psql": {"main": "dsn"}, "approved_guilds": ["abc"]}),
            json!({"data": "/data"}),
            vec![],
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "secrets"));
    }

    #[test]
    fn test_full_secrets_and_paths() {
        let secrets = json!({
            "token": "tok",
            "psql": {"main": "dsn-main", "collector": "dsn-collector"},
            "api-keys": {"weather": "w-key"},
            "approved_guilds": [111, "222"],
            "webdav": {"upload_url": "https://dav.example", "login": "bot", "password": "pw"}
        });
        let paths = json!({
            "data": "/data",
            "upload": "/srv/upload",
            "brains": "/run/brains.sock",
            "hostname": ""
        });
        let config = EffectiveConfig::assemble(merged(secrets, paths, vec![])).unwrap();

        assert_eq!(config.psql_dsn("collector"), Some("dsn-collector"));
        assert_eq!(config.secrets().api_keys["weather"], "w-key");
        assert!(config.is_approved_guild(111));
        assert!(config.is_approved_guild(222));
        assert!(!config.is_approved_guild(333));
        assert_eq!(
            config.secrets().webdav.as_ref().map(|w| w.login.as_str()),
            Some("bot")
        );
        assert_eq!(config.paths().upload.as_deref(), Some(Path::new("/srv/upload")));
        assert_eq!(config.paths().brains.as_deref(), Some("/run/brains.sock"));
        assert!(config.paths().hostname.is_none());
    }

    #[test]
    fn test_guilds_assembled() {
        let config = EffectiveConfig::assemble(merged(
            minimal_secrets(),
            json!({"data": "/data"}),
            vec![json!({"id": 42, "name": "answer", "members": {"7": {"name": "seven"}}})],
        ))
        .unwrap();

        let guild = config.guild(42).unwrap();
        assert_eq!(guild.name, "answer");
        assert_eq!(guild.members[&7].name, "seven");
    }

    #[test]
    fn test_bad_guild_is_invalid() {
        let err = EffectiveConfig::assemble(merged(
            minimal_secrets(),
            json!({"data": "/data"}),
            vec![json!({"id": 42, "roles": {"r": {"not_a_permission": true}}})],
        ))
        .unwrap_err();
        match err {
            ConfigError::InvalidValue { key, reason } => {
                assert_eq!(key, "guild.42");
                assert!(reason.contains("not_a_permission"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dotted_lookup() {
        let secrets = json!({
            "token": "t",
            "psql": {"main": "dsn"},
            "reminders": {"channel": "general"}
        });
        let config =
            EffectiveConfig::assemble(merged(secrets, json!({"data": "/data"}), vec![])).unwrap();

        assert_eq!(config.secret("reminders.channel"), Some(&json!("general")));
        assert_eq!(config.path("data"), Some(&json!("/data")));
        assert!(config.secret("reminders.missing").is_none());
    }

    #[test]
    fn test_redaction() {
        let secrets = json!({
            "token": "super-secret",
            "psql": {"main": "postgres://bot:pw@db/discord"},
            "api_keys": {"weather": "w-key"},
            "approved_guilds": [1]
        });
        let config =
            EffectiveConfig::assemble(merged(secrets, json!({"data": "/data"}), vec![])).unwrap();
        let redacted = config.redacted();

        assert_eq!(redacted["secrets"]["token"], REDACTED);
        assert_eq!(redacted["secrets"]["psql"]["main"], REDACTED);
        assert_eq!(redacted["secrets"]["api_keys"]["weather"], REDACTED);
        assert_eq!(redacted["secrets"]["approved_guilds"][0], 1);
        assert_eq!(redacted["paths"]["data"], "/data");

        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("pw@db"));
        assert!(!format!("{:?}", config.secrets()).contains("super-secret"));
    }
}
