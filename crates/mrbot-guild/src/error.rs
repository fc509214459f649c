//! Guild definition errors.

/// Errors raised while reading a guild definition.
#[derive(Debug, thiserror::Error)]
pub enum GuildError {
    #[error("guild definition is not a JSON object")]
    NotAnObject,

    #[error("guild definition has no usable 'id'")]
    MissingId,

    #[error("invalid guild definition: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("member id '{0}' is not a number")]
    InvalidMemberId(String),

    #[error("role '{role}': unknown permission '{permission}'")]
    UnknownPermission { role: String, permission: String },
}
