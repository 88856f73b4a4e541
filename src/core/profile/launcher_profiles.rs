// ─── Launcher Profiles ───
// The vanilla launcher's `launcher_profiles.json`, kept as an ordered JSON
// document. Only the entry being written goes through `LauncherProfile`;
// everything else is carried through in its original order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::{ModpackError, ModpackResult};

pub const LAUNCHER_PROFILES_FILE: &str = "launcher_profiles.json";
pub const CUSTOM_PROFILE_TYPE: &str = "custom";

const PROFILES_KEY: &str = "profiles";
const SELECTED_USER_KEY: &str = "selectedUser";
const SELECTED_PROFILE_KEY: &str = "profile";

/// Typed view of a single entry under `profiles`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LauncherProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_args: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub profile_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The whole registry file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LauncherProfiles {
    document: Map<String, Value>,
}

impl LauncherProfiles {
    pub fn parse(raw: &str) -> ModpackResult<Self> {
        match serde_json::from_str(raw)? {
            Value::Object(document) => Ok(Self { document }),
            _ => Err(ModpackError::Other(format!(
                "{} does not hold a JSON object",
                LAUNCHER_PROFILES_FILE
            ))),
        }
    }

    pub fn to_json(&self) -> ModpackResult<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }

    fn profiles(&self) -> Option<&Map<String, Value>> {
        self.document.get(PROFILES_KEY)?.as_object()
    }

    fn profiles_mut(&mut self) -> ModpackResult<&mut Map<String, Value>> {
        self.document
            .entry(PROFILES_KEY)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| {
                ModpackError::Other(format!(
                    "'{}' in {} is not an object",
                    PROFILES_KEY, LAUNCHER_PROFILES_FILE
                ))
            })
    }

    pub fn contains(&self, profile_id: &str) -> bool {
        self.profiles().is_some_and(|p| p.contains_key(profile_id))
    }

    /// Profile ids in file order.
    pub fn profile_ids(&self) -> impl Iterator<Item = &str> {
        self.profiles()
            .into_iter()
            .flat_map(|profiles| profiles.keys().map(String::as_str))
    }

    /// Typed copy of one entry; `None` when absent or not shaped like a profile.
    pub fn profile(&self, profile_id: &str) -> Option<LauncherProfile> {
        let entry = self.profiles()?.get(profile_id)?;
        serde_json::from_value(entry.clone()).ok()
    }

    /// Write `entry` under `profile_id`. An existing entry keeps its position and
    /// any fields `entry` does not set; a new one is appended.
    pub fn upsert_profile(&mut self, profile_id: &str, entry: &LauncherProfile) -> ModpackResult<()> {
        let Value::Object(fields) = serde_json::to_value(entry)? else {
            return Err(ModpackError::Other(format!(
                "profile {} did not serialize to an object",
                profile_id
            )));
        };

        let profiles = self.profiles_mut()?;
        match profiles.get_mut(profile_id).and_then(Value::as_object_mut) {
            Some(existing) => existing.extend(fields),
            None => {
                profiles.insert(profile_id.to_string(), Value::Object(fields));
            }
        }
        Ok(())
    }

    /// Remove an entry without disturbing the order of the others.
    pub fn remove_profile(&mut self, profile_id: &str) -> Option<Value> {
        self.document
            .get_mut(PROFILES_KEY)?
            .as_object_mut()?
            .shift_remove(profile_id)
    }

    pub fn selected_profile(&self) -> Option<&str> {
        self.document
            .get(SELECTED_USER_KEY)?
            .get(SELECTED_PROFILE_KEY)?
            .as_str()
    }

    pub fn select(&mut self, profile_id: Option<String>) {
        let user = self
            .document
            .entry(SELECTED_USER_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if !user.is_object() {
            *user = Value::Object(Map::new());
        }
        let Some(user) = user.as_object_mut() else {
            return;
        };
        match profile_id {
            Some(id) => {
                user.insert(SELECTED_PROFILE_KEY.to_string(), Value::String(id));
            }
            None => {
                user.shift_remove(SELECTED_PROFILE_KEY);
            }
        }
    }
}
