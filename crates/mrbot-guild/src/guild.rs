//! Guild, member, role and text channel definitions.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::GuildError;
use crate::parse_snowflake;
use crate::permissions::PermissionOverwrite;

/// A named role and the permissions it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDef {
    pub name: String,
    pub permissions: PermissionOverwrite,
}

impl RoleDef {
    /// Render as `{"<name>": {<permission>: <allow>, ...}}`.
    pub fn to_value(&self) -> Value {
        let perms: serde_json::Map<String, Value> = self
            .permissions
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Bool(v)))
            .collect();
        let mut out = serde_json::Map::new();
        out.insert(self.name.clone(), Value::Object(perms));
        Value::Object(out)
    }
}

/// A member the bot knows by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberDef {
    pub id: u64,
    pub name: String,
    /// Member gets a personal role named after them
    pub self_role: bool,
    pub roles: Vec<String>,
}

/// A text channel and who may see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChannelDef {
    pub name: String,
    pub roles: Vec<String>,
    pub member_names: Vec<String>,
    pub member_ids: Vec<u64>,
    pub read_only: bool,
}

/// Complete definition of one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuildDef {
    pub id: u64,
    pub name: String,
    pub members: BTreeMap<u64, MemberDef>,
    pub text_channels: BTreeMap<String, TextChannelDef>,
    pub roles: BTreeMap<String, RoleDef>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Accept `null`, a single value, or a list.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::Many(v)) => v,
        Some(OneOrMany::One(v)) => vec![v],
    })
}

#[derive(Deserialize)]
struct RawMember {
    #[serde(default)]
    name: String,
    #[serde(default)]
    self_role: bool,
    #[serde(default, deserialize_with = "one_or_many")]
    roles: Vec<String>,
}

#[derive(Deserialize)]
struct RawTextChannel {
    #[serde(default, deserialize_with = "one_or_many")]
    roles: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    member_names: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    member_ids: Vec<u64>,
    #[serde(default)]
    read_only: bool,
}

#[derive(Deserialize)]
struct RawGuild {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    members: BTreeMap<String, RawMember>,
    #[serde(default)]
    text_channels: BTreeMap<String, RawTextChannel>,
    #[serde(default)]
    roles: BTreeMap<String, BTreeMap<String, bool>>,
}

impl GuildDef {
    /// Build a guild definition from a merged guild object.
    pub fn from_value(value: &Value) -> Result<Self, GuildError> {
        let obj = value.as_object().ok_or(GuildError::NotAnObject)?;
        let id = obj
            .get("id")
            .and_then(parse_snowflake)
            .ok_or(GuildError::MissingId)?;
        let raw: RawGuild = serde_json::from_value(value.clone())?;

        let mut roles = BTreeMap::new();
        for (name, entries) in raw.roles {
            let permissions = PermissionOverwrite::new(entries).map_err(|permission| {
                GuildError::UnknownPermission {
                    role: name.clone(),
                    permission,
                }
            })?;
            roles.insert(name.clone(), RoleDef { name, permissions });
        }

        let mut members = BTreeMap::new();
        for (key, member) in raw.members {
            let member_id: u64 = key
                .trim()
                .parse()
                .map_err(|_| GuildError::InvalidMemberId(key.clone()))?;
            members.insert(
                member_id,
                MemberDef {
                    id: member_id,
                    name: member.name,
                    self_role: member.self_role,
                    roles: member.roles,
                },
            );
        }

        let text_channels = raw
            .text_channels
            .into_iter()
            .map(|(name, ch)| {
                let def = TextChannelDef {
                    name: name.clone(),
                    roles: ch.roles,
                    member_names: ch.member_names,
                    member_ids: ch.member_ids,
                    read_only: ch.read_only,
                };
                (name, def)
            })
            .collect();

        Ok(Self {
            id,
            name: raw.name.unwrap_or_default(),
            members,
            text_channels,
            roles,
        })
    }

    /// Find a member definition by display name.
    pub fn find_member_by_name(&self, name: &str) -> Option<&MemberDef> {
        self.members.values().find(|m| m.name == name)
    }
}
