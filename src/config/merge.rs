//! Configuration merge logic
//!
//! Fragments of one kind are merged shallowly in precedence order:
//! - Top-level keys: override (later fragment wins)
//! - Nested objects and arrays: REPLACE wholesale, never merged recursively
//!
//! Precedence order within a kind:
//! 1. Fragments named `main` (secrets/paths only)
//! 2. Every other fragment not in the override list, in caller order
//! 3. Override fragments, in override-list order

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use super::error::ConfigError;
use super::fragment::{ConfigFragment, FragmentKind, FragmentProvenance, FragmentSelector};

/// Name of the base fragment for secrets and paths
pub const MAIN_FRAGMENT: &str = "main";

/// Alternate top-level spellings, as `(kind, alias, key)`
const KEY_ALIASES: &[(FragmentKind, &str, &str)] =
    &[(FragmentKind::Secrets, "api-keys", "api_keys")];

fn canonical_key(kind: FragmentKind, key: &str) -> &str {
    KEY_ALIASES
        .iter()
        .find(|(k, alias, _)| *k == kind && *alias == key)
        .map_or(key, |(_, _, canonical)| *canonical)
}

/// Shallow merge: every top-level key of `overlay` replaces the one in `base`.
pub fn shallow_merge(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        base.insert(key.clone(), value.clone());
    }
}

/// Order the fragments of `kind` for merging.
///
/// Fragments of other kinds are ignored. `overrides` names fragments of
/// `kind` that must be merged last, in the given order.
pub fn merge_order<'a>(
    kind: FragmentKind,
    fragments: &'a [ConfigFragment],
    overrides: &[String],
) -> Result<Vec<&'a ConfigFragment>, ConfigError> {
    let of_kind: Vec<&ConfigFragment> = fragments.iter().filter(|f| f.kind() == kind).collect();

    let mut seen = HashSet::new();
    for fragment in &of_kind {
        if !seen.insert(fragment.name()) {
            return Err(ConfigError::DuplicateName {
                kind,
                name: fragment.name().to_string(),
            });
        }
    }

    let mut requested = HashSet::new();
    for name in overrides {
        if !requested.insert(name.as_str()) {
            return Err(ConfigError::DuplicateName {
                kind,
                name: name.clone(),
            });
        }
    }

    let is_main = |f: &ConfigFragment| kind != FragmentKind::Guild && f.name() == MAIN_FRAGMENT;
    let (mut ordered, rest): (Vec<&ConfigFragment>, Vec<&ConfigFragment>) = of_kind
        .iter()
        .copied()
        .filter(|f| !requested.contains(f.name()))
        .partition(|f| is_main(*f));
    ordered.extend(rest);

    for name in overrides {
        let fragment = of_kind
            .iter()
            .copied()
            .find(|f| f.name() == name.as_str())
            .ok_or_else(|| {
                ConfigError::unavailable(
                    FragmentSelector::new(kind, name.clone()).to_string(),
                    "requested override was not supplied",
                )
            })?;
        ordered.push(fragment);
    }

    Ok(ordered)
}

/// Merge all fragments of `kind` into one mapping.
pub fn merge_fragments(
    kind: FragmentKind,
    fragments: &[ConfigFragment],
    overrides: &[String],
) -> Result<Map<String, Value>, ConfigError> {
    let ordered = merge_order(kind, fragments, overrides)?;
    let mut merged = Map::new();
    for fragment in ordered {
        for (key, value) in fragment.data() {
            merged.insert(canonical_key(kind, key).to_string(), value.clone());
        }
    }
    Ok(merged)
}

/// Merge guild fragments into one mapping per guild id.
pub fn merge_guilds(
    fragments: &[ConfigFragment],
    overrides: &[String],
) -> Result<BTreeMap<u64, Map<String, Value>>, ConfigError> {
    let ordered = merge_order(FragmentKind::Guild, fragments, overrides)?;
    let mut guilds: BTreeMap<u64, Map<String, Value>> = BTreeMap::new();

    for fragment in ordered {
        let id = fragment
            .data()
            .get("id")
            .and_then(mrbot_guild::parse_snowflake)
            .ok_or_else(|| {
                ConfigError::invalid(
                    format!("{}.id", fragment.selector()),
                    "guild fragment needs a numeric 'id'",
                )
            })?;
        shallow_merge(guilds.entry(id).or_default(), fragment.data());
    }

    Ok(guilds)
}

/// Per-kind merge results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedConfig {
    pub secrets: Map<String, Value>,
    pub paths: Map<String, Value>,
    pub guilds: BTreeMap<u64, Map<String, Value>>,

    /// Contributing fragments in merge order
    pub sources: Vec<FragmentProvenance>,
}

impl MergedConfig {
    /// Merge every kind. `extras` is the override list across all kinds.
    pub fn merge(
        fragments: &[ConfigFragment],
        extras: &[FragmentSelector],
    ) -> Result<Self, ConfigError> {
        let overrides_for = |kind: FragmentKind| -> Vec<String> {
            extras
                .iter()
                .filter(|s| s.kind == kind)
                .map(|s| s.name.clone())
                .collect()
        };

        let mut sources = Vec::new();
        for kind in FragmentKind::ALL {
            for fragment in merge_order(kind, fragments, &overrides_for(kind))? {
                tracing::debug!(fragment = %fragment.selector(), "merging config fragment");
                sources.push(fragment.provenance().clone());
            }
        }

        let secrets_overrides = overrides_for(FragmentKind::Secrets);
        let paths_overrides = overrides_for(FragmentKind::Paths);
        Ok(Self {
            secrets: merge_fragments(FragmentKind::Secrets, fragments, &secrets_overrides)?,
            paths: merge_fragments(FragmentKind::Paths, fragments, &paths_overrides)?,
            guilds: merge_guilds(fragments, &overrides_for(FragmentKind::Guild))?,
            sources,
        })
    }
}
