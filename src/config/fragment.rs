//! Configuration fragments and the file reader
//!
//! A fragment is one unit of configuration data: a JSON object tagged with a
//! kind (`secrets`, `paths` or `guild`) and a name. Fragments are read once at
//! startup and consumed by the merger.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use super::error::ConfigError;

/// Category of a configuration fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Secrets,
    Paths,
    Guild,
}

impl FragmentKind {
    pub const ALL: [FragmentKind; 3] = [Self::Secrets, Self::Paths, Self::Guild];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secrets => "secrets",
            Self::Paths => "paths",
            Self::Guild => "guild",
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FragmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "secrets" => Ok(Self::Secrets),
            "paths" => Ok(Self::Paths),
            "guild" => Ok(Self::Guild),
            other => Err(format!(
                "unknown config type '{}' (expected secrets, paths or guild)",
                other
            )),
        }
    }
}

/// A `<type>:<name>` reference to a named fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentSelector {
    pub kind: FragmentKind,
    pub name: String,
}

impl FragmentSelector {
    pub fn new(kind: FragmentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for FragmentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

impl FromStr for FragmentSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| format!("expected <type>:<name>, got '{}'", s))?;
        let kind: FragmentKind = kind.parse()?;
        if name.is_empty() {
            return Err(format!("missing fragment name in '{}'", s));
        }
        Ok(Self::new(kind, name))
    }
}

/// Where a fragment was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentOrigin {
    File,
    Database,
    Inline,
}

/// Provenance record for one contributing fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentProvenance {
    pub kind: FragmentKind,
    pub name: String,
    pub origin: FragmentOrigin,

    /// File path or `table:type:name` for database rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// SHA-256 of the raw bytes the fragment was parsed from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// One configuration fragment
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFragment {
    kind: FragmentKind,
    name: String,
    data: Map<String, Value>,
    provenance: FragmentProvenance,
}

impl ConfigFragment {
    /// Build a fragment from in-memory data.
    pub fn new(kind: FragmentKind, name: impl Into<String>, data: Map<String, Value>) -> Self {
        let name = name.into();
        Self {
            provenance: FragmentProvenance {
                kind,
                name: name.clone(),
                origin: FragmentOrigin::Inline,
                location: None,
                digest: None,
            },
            kind,
            name,
            data,
        }
    }

    /// Build a fragment from a JSON value, which must be an object.
    pub fn from_value(
        kind: FragmentKind,
        name: impl Into<String>,
        value: Value,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        match value {
            Value::Object(data) => Ok(Self::new(kind, name, data)),
            other => Err(ConfigError::unavailable(
                format!("{}:{}", kind, name),
                format!("expected a JSON object, found {}", json_type_name(&other)),
            )),
        }
    }

    pub(crate) fn with_provenance(
        mut self,
        origin: FragmentOrigin,
        location: String,
        raw: &[u8],
    ) -> Self {
        self.provenance.origin = origin;
        self.provenance.location = Some(location);
        self.provenance.digest = Some(sha256_hex(raw));
        self
    }

    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn provenance(&self) -> &FragmentProvenance {
        &self.provenance
    }

    pub fn selector(&self) -> FragmentSelector {
        FragmentSelector::new(self.kind, self.name.clone())
    }
}

/// Read a JSON fragment from a file; the fragment is named after the file stem.
pub fn read_json_file(kind: FragmentKind, path: &Path) -> Result<ConfigFragment, ConfigError> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let label = format!("{}:{} ({})", kind, name, path.display());

    if name.is_empty() {
        return Err(ConfigError::unavailable(label, "path has no file name"));
    }

    let bytes = fs::read(path).map_err(|e| ConfigError::unavailable(label.clone(), e))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| ConfigError::unavailable(label.clone(), format!("JSON parse error: {}", e)))?;

    let fragment = ConfigFragment::from_value(kind, name, value)
        .map_err(|e| match e {
            ConfigError::SourceUnavailable { reason, .. } => {
                ConfigError::unavailable(label.clone(), reason)
            }
            other => other,
        })?
        .with_provenance(FragmentOrigin::File, path.display().to_string(), &bytes);

    tracing::debug!(
        kind = %kind,
        name = fragment.name(),
        path = %path.display(),
        keys = fragment.data().len(),
        "read config fragment"
    );

    Ok(fragment)
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
