// ─── Modpack Manifest ───
// Declarative description of a modpack, parsed from `manifest.json`.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::mod_ref::{RegistryModRef, ReleaseType, VersionPreference};
use crate::core::error::{ModpackError, ModpackResult};

/// Which side of the game a set of mods is installed for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Client,
    Server,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Client => write!(f, "client"),
            Target::Server => write!(f, "server"),
        }
    }
}

/// Glob patterns for files shipped alongside the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalResources {
    /// Replaced on update.
    #[serde(default)]
    pub overwrite: BTreeSet<String>,
    /// Copied once, never replaced.
    #[serde(default)]
    pub immutable: BTreeSet<String>,
}

impl ExternalResources {
    pub fn is_empty(&self) -> bool {
        self.overwrite.is_empty() && self.immutable.is_empty()
    }
}

/// A mod hosted outside the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalModRef {
    pub identifier: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub url: String,
    /// Local file name; derived from the URL when absent.
    pub file: Option<String>,
}

/// Platform-specific Java runtime archives.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JavaDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub darwin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<String>,
}

impl JavaDownloads {
    pub fn is_empty(&self) -> bool {
        self.windows.is_none() && self.darwin.is_none() && self.linux.is_none()
    }

    pub fn for_current_platform(&self) -> Option<&str> {
        if cfg!(target_os = "windows") {
            self.windows.as_deref()
        } else if cfg!(target_os = "macos") {
            self.darwin.as_deref()
        } else {
            self.linux.as_deref()
        }
    }
}

/// Mods, resources and JVM arguments for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSpec {
    pub java_args: String,
    pub external_resources: ExternalResources,
    pub external_mods: BTreeMap<String, ExternalModRef>,
    pub registry_mods: BTreeMap<String, RegistryModRef>,
}

impl TargetSpec {
    pub fn contains_mod(&self, identifier: &str) -> bool {
        self.registry_mods.contains_key(identifier) || self.external_mods.contains_key(identifier)
    }

    pub fn mod_count(&self) -> usize {
        self.registry_mods.len() + self.external_mods.len()
    }
}

/// Parsed modpack manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub profile_name: Option<String>,
    pub profile_id: Option<String>,
    pub profile_icon: Option<String>,
    pub version_label: Option<String>,
    pub forge_download: Option<String>,
    pub java_downloads: JavaDownloads,
    /// Compatible game versions, duplicates removed, declaration order kept.
    pub game_versions: Vec<String>,
    pub release_preference: ReleaseType,
    /// Mod identifiers in the order the launcher should load them.
    pub load_priority: Vec<String>,
    pub client: TargetSpec,
    pub server: TargetSpec,
}

impl Manifest {
    /// Parse a manifest document. Any structural problem is fatal.
    pub fn parse(raw: &str) -> ModpackResult<Self> {
        let document: ManifestDocument =
            serde_json::from_str(raw).map_err(|e| ModpackError::ManifestParse(e.to_string()))?;

        let manifest = Self {
            profile_name: document.profile_name,
            profile_id: document.profile_id,
            profile_icon: document.profile_icon,
            version_label: document.version_label,
            forge_download: document.forge_download,
            java_downloads: document.java_downloads,
            game_versions: dedup_ordered(document.game_versions),
            release_preference: document.release_preference,
            load_priority: dedup_ordered(document.load_priority),
            client: document.client.into_spec(Target::Client)?,
            server: document.server.into_spec(Target::Server)?,
        };

        for identifier in manifest.dangling_load_priority() {
            warn!(
                "Load priority references '{}' which no target declares",
                identifier
            );
        }

        debug!(
            "Parsed manifest: {} client mods, {} server mods, game versions {:?}",
            manifest.client.mod_count(),
            manifest.server.mod_count(),
            manifest.game_versions
        );
        Ok(manifest)
    }

    /// Serialize back to the on-disk JSON format.
    pub fn to_json(&self) -> ModpackResult<String> {
        let document = ManifestDocument {
            profile_name: self.profile_name.clone(),
            profile_id: self.profile_id.clone(),
            profile_icon: self.profile_icon.clone(),
            version_label: self.version_label.clone(),
            forge_download: self.forge_download.clone(),
            java_downloads: self.java_downloads.clone(),
            game_versions: self.game_versions.clone(),
            release_preference: self.release_preference,
            load_priority: self.load_priority.clone(),
            client: TargetDocument::from_spec(&self.client),
            server: TargetDocument::from_spec(&self.server),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    pub async fn load(path: &Path) -> ModpackResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ModpackError::io(path, e))?;
        Self::parse(&raw)
    }

    pub async fn save(&self, path: &Path) -> ModpackResult<()> {
        let json = self.to_json()?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| ModpackError::io(path, e))
    }

    pub fn target(&self, target: Target) -> &TargetSpec {
        match target {
            Target::Client => &self.client,
            Target::Server => &self.server,
        }
    }

    /// The reference's own pin, else the manifest-wide release preference.
    pub fn effective_preference(&self, mod_ref: &RegistryModRef) -> VersionPreference {
        mod_ref
            .version
            .unwrap_or(VersionPreference::ReleaseType(self.release_preference))
    }

    /// Load-priority entries that neither target declares.
    pub fn dangling_load_priority(&self) -> Vec<&str> {
        self.load_priority
            .iter()
            .filter(|id| !self.client.contains_mod(id) && !self.server.contains_mod(id))
            .map(String::as_str)
            .collect()
    }
}

fn dedup_ordered(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

// ── Wire format ─────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct ManifestDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile_icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    forge_download: Option<String>,
    #[serde(default, skip_serializing_if = "JavaDownloads::is_empty")]
    java_downloads: JavaDownloads,
    #[serde(default)]
    game_versions: Vec<String>,
    #[serde(default)]
    release_preference: ReleaseType,
    #[serde(default)]
    load_priority: Vec<String>,
    #[serde(default)]
    client: TargetDocument,
    #[serde(default)]
    server: TargetDocument,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TargetDocument {
    #[serde(default)]
    java_args: String,
    #[serde(default, alias = "external_files")]
    external_resources: ExternalResources,
    #[serde(default)]
    external_mods: BTreeMap<String, ExternalModDocument>,
    #[serde(default)]
    curseforge_mods: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExternalModDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
}

impl TargetDocument {
    fn into_spec(self, target: Target) -> ModpackResult<TargetSpec> {
        let mut spec = TargetSpec {
            java_args: self.java_args,
            external_resources: self.external_resources,
            ..TargetSpec::default()
        };

        for (identifier, doc) in self.external_mods {
            let external = ExternalModRef {
                identifier: identifier.clone(),
                name: doc.name,
                version: doc.version,
                url: doc.url,
                file: doc.file,
            };
            spec.external_mods.insert(identifier, external);
        }

        for raw in &self.curseforge_mods {
            let mod_ref: RegistryModRef = raw.parse()?;
            if spec.contains_mod(&mod_ref.identifier) {
                return Err(ModpackError::DuplicateMod {
                    identifier: mod_ref.identifier,
                    target: target.to_string(),
                });
            }
            spec.registry_mods.insert(mod_ref.identifier.clone(), mod_ref);
        }

        Ok(spec)
    }

    fn from_spec(spec: &TargetSpec) -> Self {
        Self {
            java_args: spec.java_args.clone(),
            external_resources: spec.external_resources.clone(),
            external_mods: spec
                .external_mods
                .iter()
                .map(|(identifier, external)| {
                    (
                        identifier.clone(),
                        ExternalModDocument {
                            name: external.name.clone(),
                            version: external.version.clone(),
                            url: external.url.clone(),
                            file: external.file.clone(),
                        },
                    )
                })
                .collect(),
            curseforge_mods: spec
                .registry_mods
                .values()
                .map(RegistryModRef::to_string)
                .collect(),
        }
    }
}
