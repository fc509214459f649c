//! Typed guild definitions.
//!
//! A guild fragment describes the roles, members and text channels the bot
//! manages in one guild. This crate turns the raw JSON object into a
//! [`GuildDef`] and validates permission names along the way.

mod error;
mod guild;
mod permissions;

pub use error::GuildError;
pub use guild::{GuildDef, MemberDef, RoleDef, TextChannelDef};
pub use permissions::{PermissionOverwrite, KNOWN_PERMISSIONS};

/// Parse a guild identifier from a JSON number or a numeric string.
///
/// Chat-platform identifiers exceed the safe integer range of some JSON
/// producers, so both spellings appear in the wild.
pub fn parse_snowflake(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_snowflake_number() {
        assert_eq!(parse_snowflake(&json!(123)), Some(123));
    }

    #[test]
    fn test_parse_snowflake_string() {
        assert_eq!(parse_snowflake(&json!(" 227847073607712768 ")), Some(227847073607712768));
    }

    #[test]
    fn test_parse_snowflake_rejects_other_shapes() {
        assert_eq!(parse_snowflake(&json!(-1)), None);
        assert_eq!(parse_snowflake(&json!("abc")), None);
        assert_eq!(parse_snowflake(&json!(null)), None);
        assert_eq!(parse_snowflake(&json!([1])), None);
    }
}
