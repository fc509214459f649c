//! Permission overwrites for roles and channels.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Permission names accepted in role definitions.
pub const KNOWN_PERMISSIONS: &[&str] = &[
    "add_reactions",
    "administrator",
    "attach_files",
    "ban_members",
    "change_nickname",
    "connect",
    "create_instant_invite",
    "create_private_threads",
    "create_public_threads",
    "deafen_members",
    "embed_links",
    "external_emojis",
    "external_stickers",
    "kick_members",
    "manage_channels",
    "manage_emojis",
    "manage_emojis_and_stickers",
    "manage_events",
    "manage_guild",
    "manage_messages",
    "manage_nicknames",
    "manage_permissions",
    "manage_roles",
    "manage_threads",
    "manage_webhooks",
    "mention_everyone",
    "moderate_members",
    "move_members",
    "mute_members",
    "priority_speaker",
    "read_message_history",
    "read_messages",
    "request_to_speak",
    "send_messages",
    "send_messages_in_threads",
    "send_tts_messages",
    "speak",
    "stream",
    "use_application_commands",
    "use_embedded_activities",
    "use_external_emojis",
    "use_external_stickers",
    "use_voice_activation",
    "view_audit_log",
    "view_channel",
    "view_guild_insights",
];

/// Explicit allow/deny entries; permissions not listed are inherited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionOverwrite {
    entries: BTreeMap<String, bool>,
}

impl<'de> Deserialize<'de> for PermissionOverwrite {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = BTreeMap::<String, bool>::deserialize(deserializer)?;
        Self::new(entries).map_err(|name| {
            serde::de::Error::custom(format!("unknown permission '{}'", name))
        })
    }
}

impl PermissionOverwrite {
    /// Build an overwrite, rejecting the first unknown permission name.
    pub fn new(entries: BTreeMap<String, bool>) -> Result<Self, String> {
        if let Some(unknown) = entries
            .keys()
            .find(|name| !KNOWN_PERMISSIONS.contains(&name.as_str()))
        {
            return Err(unknown.clone());
        }
        Ok(Self { entries })
    }

    fn from_pairs(pairs: &[(&str, bool)]) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(name, allow)| (name.to_string(), *allow))
                .collect(),
        }
    }

    /// Reading and writing messages.
    pub fn read_write() -> Self {
        Self::from_pairs(&[
            ("read_messages", true),
            ("read_message_history", true),
            ("send_messages", true),
            ("send_tts_messages", true),
            ("manage_messages", false),
            ("embed_links", true),
            ("attach_files", true),
            ("mention_everyone", true),
            ("external_emojis", true),
            ("add_reactions", true),
        ])
    }

    /// Reading only; reactions stay allowed.
    pub fn read_only() -> Self {
        Self::from_pairs(&[
            ("read_messages", true),
            ("read_message_history", true),
            ("send_messages", false),
            ("send_tts_messages", false),
            ("add_reactions", true),
        ])
    }

    /// No access at all.
    pub fn deny() -> Self {
        Self::from_pairs(&[
            ("read_messages", false),
            ("read_message_history", false),
            ("send_messages", false),
            ("send_tts_messages", false),
        ])
    }

    /// `Some(true)` if allowed, `Some(false)` if denied, `None` if inherited.
    pub fn get(&self, permission: &str) -> Option<bool> {
        self.entries.get(permission).copied()
    }

    /// Names of explicitly allowed permissions.
    pub fn granted(&self) -> BTreeSet<&str> {
        self.entries
            .iter()
            .filter(|(_, allow)| **allow)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_checks_names() {
        let ok: PermissionOverwrite =
            serde_json::from_value(json!({"read_messages": true, "send_messages": false}))
                .unwrap();
        assert_eq!(ok.get("send_messages"), Some(false));

        let err = serde_json::from_value::<PermissionOverwrite>(json!({"fly": true})).unwrap_err();
        assert!(err.to_string().contains("unknown permission 'fly'"));
    }

    #[test]
    fn test_known_permissions_sorted_and_unique() {
        let mut sorted = KNOWN_PERMISSIONS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), KNOWN_PERMISSIONS.len());
    }

    #[test]
    fn test_unknown_permission_rejected() {
        let mut entries = BTreeMap::new();
        entries.insert("read_messages".to_string(), true);
        entries.insert("fly".to_string(), true);
        assert_eq!(PermissionOverwrite::new(entries).unwrap_err(), "fly");
    }

    #[test]
    fn test_granted_skips_denied() {
        let overwrite = PermissionOverwrite::read_only();
        let granted = overwrite.granted();
        assert!(granted.contains("read_messages"));
        assert!(granted.contains("add_reactions"));
        assert!(!granted.contains("send_messages"));
        assert_eq!(overwrite.get("send_messages"), Some(false));
        assert_eq!(overwrite.get("speak"), None);
    }

    #[test]
    fn test_deny_grants_nothing() {
        assert!(PermissionOverwrite::deny().granted().is_empty());
        assert!(!PermissionOverwrite::deny().is_empty());
    }

    #[test]
    fn test_read_write_keeps_manage_messages_denied() {
        assert_eq!(PermissionOverwrite::read_write().get("manage_messages"), Some(false));
    }
}
