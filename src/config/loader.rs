//! Startup loading: read every fragment, merge, assemble
//!
//! Loading is all-or-nothing. The first failing fragment aborts startup.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use super::effective::EffectiveConfig;
use super::error::ConfigError;
use super::fragment::{read_json_file, ConfigFragment, FragmentKind, FragmentSelector};
use super::merge::{MergedConfig, MAIN_FRAGMENT};
use super::psql::PsqlFragmentStore;
use super::source::FragmentSource;

/// Environment variable holding the config database DSN
pub const DSN_ENV: &str = "CONFIG_DSN";

/// JSON files to load, per kind, in precedence order
#[derive(Debug, Clone, Default)]
pub struct JsonSources {
    pub secrets: Vec<PathBuf>,
    pub paths: Vec<PathBuf>,
    pub guilds: Vec<PathBuf>,
}

impl JsonSources {
    pub fn read_fragments(&self) -> Result<Vec<ConfigFragment>, ConfigError> {
        let groups = [
            (FragmentKind::Secrets, &self.secrets),
            (FragmentKind::Paths, &self.paths),
            (FragmentKind::Guild, &self.guilds),
        ];
        let mut fragments = Vec::new();
        for (kind, files) in groups {
            for path in files {
                fragments.push(read_json_file(kind, path)?);
            }
        }
        Ok(fragments)
    }
}

/// Merge and assemble already-read fragments.
pub fn assemble_fragments(
    fragments: &[ConfigFragment],
    extras: &[FragmentSelector],
) -> Result<EffectiveConfig, ConfigError> {
    let merged = MergedConfig::merge(fragments, extras)?;
    EffectiveConfig::assemble(merged)
}

/// Load the effective config from JSON files.
pub fn load_json(sources: &JsonSources) -> Result<EffectiveConfig, ConfigError> {
    let fragments = sources.read_fragments()?;
    tracing::info!(fragments = fragments.len(), "loaded JSON config fragments");
    assemble_fragments(&fragments, &[])
}

/// Where the config database DSN comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DsnSource {
    Literal(String),
    /// Read from [`DSN_ENV`]
    Env,
    /// Contents of a file
    File(PathBuf),
}

impl DsnSource {
    pub fn resolve(&self) -> Result<String, ConfigError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    fn resolve_with<F>(&self, env: F) -> Result<String, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (label, raw) = match self {
            Self::Literal(dsn) => ("--dsn".to_string(), dsn.clone()),
            Self::Env => (DSN_ENV.to_string(), env(DSN_ENV).unwrap_or_default()),
            Self::File(path) => {
                let contents = fs::read_to_string(path).map_err(|e| {
                    ConfigError::unavailable("dsn", format!("{}: {}", path.display(), e))
                })?;
                (path.display().to_string(), contents)
            }
        };
        let dsn = raw.trim();
        if dsn.is_empty() {
            return Err(ConfigError::unavailable("dsn", format!("{} is empty", label)));
        }
        Ok(dsn.to_string())
    }
}

fn check_unique(extras: &[FragmentSelector]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for sel in extras {
        let clashes_with_main = sel.kind != FragmentKind::Guild && sel.name == MAIN_FRAGMENT;
        if clashes_with_main || !seen.insert(sel) {
            return Err(ConfigError::DuplicateName {
                kind: sel.kind,
                name: sel.name.clone(),
            });
        }
    }
    Ok(())
}

/// Read `main` secrets and paths, every guild row, then the extras.
///
/// Guild extras are not read again: every guild row is already loaded and
/// the extra only moves it to the end of the guild merge order.
pub async fn read_psql_fragments<S>(
    source: &S,
    extras: &[FragmentSelector],
) -> Result<Vec<ConfigFragment>, ConfigError>
where
    S: FragmentSource + ?Sized,
{
    check_unique(extras)?;

    let mut fragments = vec![
        source.read(FragmentKind::Secrets, MAIN_FRAGMENT).await?,
        source.read(FragmentKind::Paths, MAIN_FRAGMENT).await?,
    ];
    fragments.extend(source.read_all(FragmentKind::Guild).await?);

    for extra in extras.iter().filter(|e| e.kind != FragmentKind::Guild) {
        fragments.push(source.read(extra.kind, &extra.name).await?);
    }
    Ok(fragments)
}

/// Read, close and assemble. The source is closed even when reading fails.
pub async fn load_from_source<S>(
    source: &S,
    extras: &[FragmentSelector],
) -> Result<EffectiveConfig, ConfigError>
where
    S: FragmentSource + ?Sized,
{
    let fragments = read_psql_fragments(source, extras).await;
    source.close().await;

    let fragments = fragments?;
    tracing::info!(
        fragments = fragments.len(),
        extras = extras.len(),
        "loaded database config fragments"
    );
    assemble_fragments(&fragments, extras)
}

/// Load the effective config from the config database.
pub async fn load_psql(
    dsn: &str,
    extras: &[FragmentSelector],
) -> Result<EffectiveConfig, ConfigError> {
    let store = PsqlFragmentStore::connect(dsn).await?;
    load_from_source(&store, extras).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::source::memory::MemorySource;
    use serde_json::json;
    use tempfile::TempDir;

    fn database() -> MemorySource {
        MemorySource::default()
            .with(
                FragmentKind::Secrets,
                "main",
                json!({"token": "A", "psql": {"main": "postgres://db/main"}}),
            )
            .with(FragmentKind::Secrets, "test", json!({"token": "B"}))
            .with(FragmentKind::Paths, "main", json!({"data": "/data"}))
            .with(FragmentKind::Guild, "prod", json!({"id": 10, "name": "prod"}))
            .with(FragmentKind::Guild, "dev", json!({"id": 10, "name": "dev"}))
    }

    fn names(fragments: &[ConfigFragment]) -> Vec<String> {
        fragments.iter().map(|f| f.selector().to_string()).collect()
    }

    #[test]
    fn test_literal_dsn_trimmed() {
        let dsn = DsnSource::Literal("  postgres://db/config \n".to_string())
            .resolve()
            .unwrap();
        assert_eq!(dsn, "postgres://db/config");
    }

    #[test]
    fn test_env_dsn() {
        let dsn = DsnSource::Env
            .resolve_with(|name| (name == DSN_ENV).then(|| "postgres://env/db\n".to_string()))
            .unwrap();
        assert_eq!(dsn, "postgres://env/db");
    }

    #[test]
    fn test_env_dsn_unset() {
        let err = DsnSource::Env.resolve_with(|_| None).unwrap_err();
        assert!(err.to_string().contains(DSN_ENV));
    }

    #[test]
    fn test_file_dsn() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dsn.txt");
        fs::write(&path, "postgres://file/db\n").unwrap();

        let dsn = DsnSource::File(path).resolve().unwrap();
        assert_eq!(dsn, "postgres://file/db");
    }

    #[test]
    fn test_file_dsn_missing() {
        let dir = TempDir::new().unwrap();
        let err = DsnSource::File(dir.path().join("missing")).resolve().unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_duplicate_extras_rejected() {
        let extras = vec![
            FragmentSelector::new(FragmentKind::Secrets, "test"),
            FragmentSelector::new(FragmentKind::Secrets, "test"),
        ];
        assert!(matches!(
            check_unique(&extras),
            Err(ConfigError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_extra_main_rejected() {
        let extras = vec![FragmentSelector::new(FragmentKind::Paths, "main")];
        assert!(check_unique(&extras).is_err());

        let extras = vec![FragmentSelector::new(FragmentKind::Guild, "main")];
        assert!(check_unique(&extras).is_ok());
    }

    #[test]
    fn test_same_name_across_kinds_allowed() {
        let extras = vec![
            FragmentSelector::new(FragmentKind::Secrets, "test"),
            FragmentSelector::new(FragmentKind::Paths, "test"),
        ];
        assert!(check_unique(&extras).is_ok());
    }

    #[tokio::test]
    async fn test_reads_main_then_guilds_then_extras() {
        let source = database();
        let extras = vec![FragmentSelector::new(FragmentKind::Secrets, "test")];

        let fragments = read_psql_fragments(&source, &extras).await.unwrap();
        assert_eq!(
            names(&fragments),
            vec!["secrets:main", "paths:main", "guild:dev", "guild:prod", "secrets:test"]
        );
        assert_eq!(
            source.reads(),
            vec!["secrets:main", "paths:main", "guild:*", "secrets:test"]
        );
    }

    #[tokio::test]
    async fn test_guild_extra_not_read_again() {
        let source = database();
        let extras = vec![FragmentSelector::new(FragmentKind::Guild, "dev")];

        let fragments = read_psql_fragments(&source, &extras).await.unwrap();
        assert_eq!(fragments.len(), 4);
        assert!(!source.reads().contains(&"guild:dev".to_string()));
    }

    #[tokio::test]
    async fn test_guild_extra_moves_row_last() {
        let source = database();
        let extras = vec![FragmentSelector::new(FragmentKind::Guild, "dev")];
        let config = load_from_source(&source, &extras).await.unwrap();
        assert_eq!(config.guild(10).unwrap().name, "dev");

        let config = load_from_source(&database(), &[]).await.unwrap();
        assert_eq!(config.guild(10).unwrap().name, "prod");
    }

    #[tokio::test]
    async fn test_unknown_extra_fails_and_closes() {
        let source = database();
        let extras = vec![FragmentSelector::new(FragmentKind::Secrets, "x")];

        let err = load_from_source(&source, &extras).await.unwrap_err();
        match err {
            ConfigError::SourceUnavailable { fragment, .. } => assert_eq!(fragment, "secrets:x"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(source.is_closed());
    }

    #[tokio::test]
    async fn test_missing_main_fails() {
        let source = MemorySource::default()
            .with(FragmentKind::Paths, "main", json!({"data": "/data"}));
        let err = read_psql_fragments(&source, &[]).await.unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable { .. }));
        assert_eq!(source.reads(), vec!["secrets:main"]);
    }

    #[tokio::test]
    async fn test_load_applies_extras_and_closes() {
        let source = database();
        let extras = vec![FragmentSelector::new(FragmentKind::Secrets, "test")];

        let config = load_from_source(&source, &extras).await.unwrap();
        assert_eq!(config.token(), "B");
        assert_eq!(config.psql_dsn("main"), Some("postgres://db/main"));
        assert!(source.is_closed());
    }
}
