// ─── Modlist Cache ───
// Persisted record of previous resolutions (`modlist.json`).

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::error::{ModpackError, ModpackResult};
use crate::core::manifest::{ReleaseType, VersionPreference};
use crate::core::registry::{ExternalFileInfo, RegistryFile, RegistryMod};
use crate::core::resolver::{ensure_plain_file_name, ResolvedFile};

pub const MODLIST_FILE: &str = "modlist.json";

/// One resolved mod as stored in `modlist.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<u64>,
    pub file_url: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_type: Option<ReleaseType>,
    /// Upload (registry) or last-modified (external) time, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

impl LockEntry {
    pub fn from_registry(registry_mod: &RegistryMod, file: &RegistryFile, file_url: String) -> Self {
        Self {
            project_id: Some(registry_mod.id),
            project_url: registry_mod.project_url().map(str::to_string),
            project_name: Some(registry_mod.title.clone()),
            file_id: Some(file.id),
            file_url,
            file_name: file.name.clone(),
            release_type: Some(file.release_type),
            timestamp: Some(file.uploaded_at.timestamp()),
            size: file.size,
            external: false,
        }
    }

    pub fn from_external(url: &str, info: &ExternalFileInfo, file_name: Option<&str>) -> Self {
        Self {
            project_id: None,
            project_url: None,
            project_name: None,
            file_id: None,
            file_url: url.to_string(),
            file_name: file_name.unwrap_or(info.file_name.as_str()).to_string(),
            release_type: None,
            timestamp: info.last_modified.map(|t| t.timestamp()),
            size: None,
            external: true,
        }
    }

    /// Whether this entry can stand in for a fresh lookup under `preference`.
    pub fn satisfies(&self, preference: VersionPreference) -> bool {
        match preference {
            VersionPreference::FileId(id) => self.file_id == Some(id),
            VersionPreference::ReleaseType(_) => true,
        }
    }

    /// The file this entry points at. Fails when `file_name` is not a plain file name.
    pub fn to_resolved(&self, identifier: &str) -> ModpackResult<ResolvedFile> {
        ensure_plain_file_name(identifier, &self.file_name)?;
        Ok(ResolvedFile {
            identifier: identifier.to_string(),
            file_id: self.file_id,
            file_name: self.file_name.clone(),
            download_url: self.file_url.clone(),
            release_type: self.release_type,
            size: self.size,
        })
    }
}

/// Identifier → lock entry map backed by a JSON file.
#[derive(Debug, Clone)]
pub struct ModListCache {
    path: PathBuf,
    entries: BTreeMap<String, LockEntry>,
}

impl ModListCache {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the cache at `path`. A missing or unreadable file yields an empty cache.
    pub async fn load(path: impl Into<PathBuf>) -> ModpackResult<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("No modlist at {:?}, starting empty", path);
            return Ok(Self::empty(path));
        }

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ModpackError::io(&path, e))?;
        let entries = match serde_json::from_str::<BTreeMap<String, LockEntry>>(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring corrupt modlist {:?}: {}", path, e);
                BTreeMap::new()
            }
        };

        debug!("Loaded modlist {:?} with {} entries", path, entries.len());
        Ok(Self { path, entries })
    }

    pub async fn save(&self) -> ModpackResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ModpackError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| ModpackError::io(&self.path, e))?;

        info!("Saved modlist {:?} ({} entries)", self.path, self.entries.len());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, identifier: &str) -> Option<&LockEntry> {
        self.entries.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn entries(&self) -> &BTreeMap<String, LockEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn merge(&mut self, entries: impl IntoIterator<Item = (String, LockEntry)>) {
        self.entries.extend(entries);
    }

    /// Remove entries whose identifier is not in `keep`. Returns the removed identifiers.
    pub fn purge_orphans(&mut self, keep: &HashSet<&str>) -> Vec<String> {
        let orphans: Vec<String> = self
            .entries
            .keys()
            .filter(|id| !keep.contains(id.as_str()))
            .cloned()
            .collect();
        for id in &orphans {
            self.entries.remove(id);
        }
        if !orphans.is_empty() {
            info!("Purged {} orphaned modlist entries", orphans.len());
        }
        orphans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(file_id: u64, name: &str) -> LockEntry {
        LockEntry {
            project_id: Some(1),
            project_url: None,
            project_name: Some("Test".into()),
            file_id: Some(file_id),
            file_url: format!("https://cdn/{}", name),
            file_name: name.into(),
            release_type: Some(ReleaseType::Release),
            timestamp: Some(1_571_000_000),
            size: None,
            external: false,
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModListCache::load(dir.path().join(MODLIST_FILE)).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(MODLIST_FILE);

        let mut cache = ModListCache::empty(&path);
        cache.merge([("jei".to_string(), entry(2803400, "jei.jar"))]);
        cache.save().await.unwrap();

        let loaded = ModListCache::load(&path).await.unwrap();
        assert_eq!(loaded.get("jei"), Some(&entry(2803400, "jei.jar")));
    }

    #[tokio::test]
    async fn corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MODLIST_FILE);
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let cache = ModListCache::load(&path).await.unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn orphans_are_kept_until_purged() {
        let mut cache = ModListCache::empty("modlist.json");
        cache.merge([
            ("jei".to_string(), entry(1, "jei.jar")),
            ("old".to_string(), entry(2, "old.jar")),
        ]);

        let keep: HashSet<&str> = ["jei"].into_iter().collect();
        let removed = cache.purge_orphans(&keep);

        assert_eq!(removed, vec!["old".to_string()]);
        assert!(cache.contains("jei"));
        assert!(!cache.contains("old"));
    }

    #[test]
    fn pinned_preference_requires_matching_file() {
        let locked = entry(10, "a.jar");
        assert!(locked.satisfies(VersionPreference::FileId(10)));
        assert!(!locked.satisfies(VersionPreference::FileId(11)));
        assert!(locked.satisfies(VersionPreference::ReleaseType(ReleaseType::Beta)));
    }

    #[test]
    fn external_entry_serializes_flag() {
        let info = ExternalFileInfo {
            file_name: "OptiFine.jar".into(),
            last_modified: None,
        };
        let locked = LockEntry::from_external("https://example.com/OptiFine.jar", &info, None);
        let json = serde_json::to_value(&locked).unwrap();
        assert_eq!(json["external"], true);
        assert!(json.get("project_id").is_none());
    }
}
