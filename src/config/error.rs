//! Configuration errors

use super::fragment::FragmentKind;

/// Errors that abort configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A fragment could not be read or parsed
    #[error("Config fragment '{fragment}' unavailable: {reason}")]
    SourceUnavailable { fragment: String, reason: String },

    /// The same (kind, name) pair was supplied twice
    #[error("Config fragment '{kind}:{name}' supplied more than once")]
    DuplicateName { kind: FragmentKind, name: String },

    /// A required key is missing after merging
    #[error("Config incomplete: missing required key '{key}'")]
    ConfigIncomplete { key: String },

    /// A key is present but has the wrong shape
    #[error("Config value '{key}' is invalid: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    pub(crate) fn unavailable(fragment: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            fragment: fragment.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}
