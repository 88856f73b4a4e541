use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::launcher_profiles::{
    LauncherProfile, LauncherProfiles, CUSTOM_PROFILE_TYPE, LAUNCHER_PROFILES_FILE,
};
use crate::core::error::{ModpackError, ModpackResult};

pub const PROFILE_ID_FILE: &str = "profile_id";

/// Values written into a launcher profile entry.
#[derive(Debug, Clone, Default)]
pub struct ProfileMeta {
    pub name: String,
    pub icon: Option<String>,
    pub java_args: String,
    pub java_path: Option<PathBuf>,
    pub version_id: Option<String>,
    pub game_dir: PathBuf,
}

/// Reads and writes the launcher profile registry in a Minecraft directory.
#[derive(Debug, Clone)]
pub struct ProfileManager {
    minecraft_dir: PathBuf,
}

impl ProfileManager {
    pub fn new(minecraft_dir: impl Into<PathBuf>) -> Self {
        Self {
            minecraft_dir: minecraft_dir.into(),
        }
    }

    pub fn profiles_path(&self) -> PathBuf {
        self.minecraft_dir.join(LAUNCHER_PROFILES_FILE)
    }

    /// Load the registry; a missing file is an empty registry.
    pub async fn load(&self) -> ModpackResult<LauncherProfiles> {
        let path = self.profiles_path();
        if !path.exists() {
            warn!("No launcher profiles at {:?}, starting a new registry", path);
            return Ok(LauncherProfiles::default());
        }
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ModpackError::io(&path, e))?;
        LauncherProfiles::parse(&raw)
    }

    pub async fn save(&self, profiles: &LauncherProfiles) -> ModpackResult<()> {
        let path = self.profiles_path();
        tokio::fs::create_dir_all(&self.minecraft_dir)
            .await
            .map_err(|e| ModpackError::io(&self.minecraft_dir, e))?;
        let json = profiles.to_json()?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| ModpackError::io(&path, e))
    }

    /// Add a new profile and make it the active one.
    ///
    /// Fails with `ProfileAlreadyExists` when the id is present; use
    /// [`update_profile`](Self::update_profile) to rewrite an existing entry.
    pub async fn install_profile(&self, profile_id: &str, meta: &ProfileMeta) -> ModpackResult<()> {
        let mut profiles = self.load().await?;
        if profiles.contains(profile_id) {
            return Err(ModpackError::ProfileAlreadyExists(profile_id.to_string()));
        }

        let now = timestamp_now();
        profiles.upsert_profile(profile_id, &build_entry(meta, now.clone(), now))?;
        profiles.select(Some(profile_id.to_string()));
        self.save(&profiles).await?;

        info!("Created launcher profile '{}' ({})", meta.name, profile_id);
        Ok(())
    }

    /// Insert or rewrite a profile, keeping its original creation time and
    /// any fields the launcher added to it.
    pub async fn update_profile(&self, profile_id: &str, meta: &ProfileMeta) -> ModpackResult<()> {
        let mut profiles = self.load().await?;
        let now = timestamp_now();

        let created = profiles
            .profile(profile_id)
            .and_then(|p| p.created)
            .unwrap_or_else(|| now.clone());
        profiles.upsert_profile(profile_id, &build_entry(meta, created, now))?;
        profiles.select(Some(profile_id.to_string()));
        self.save(&profiles).await?;

        info!("Updated launcher profile '{}' ({})", meta.name, profile_id);
        Ok(())
    }

    /// Remove a profile. If it was active, the first remaining profile in file
    /// order becomes active.
    pub async fn remove_profile(&self, profile_id: &str) -> ModpackResult<()> {
        let mut profiles = self.load().await?;
        profiles
            .remove_profile(profile_id)
            .ok_or_else(|| ModpackError::ProfileNotFound(profile_id.to_string()))?;

        if profiles.selected_profile() == Some(profile_id) {
            let fallback = profiles.profile_ids().next().map(str::to_string);
            profiles.select(fallback);
        }
        self.save(&profiles).await?;

        info!("Removed launcher profile {}", profile_id);
        Ok(())
    }

    pub async fn contains(&self, profile_id: &str) -> ModpackResult<bool> {
        Ok(self.load().await?.contains(profile_id))
    }
}

fn build_entry(meta: &ProfileMeta, created: String, last_used: String) -> LauncherProfile {
    LauncherProfile {
        created: Some(created),
        game_dir: Some(meta.game_dir.to_string_lossy().to_string()),
        icon: meta.icon.clone(),
        java_args: Some(meta.java_args.clone()),
        java_dir: meta
            .java_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        last_used: Some(last_used),
        last_version_id: meta.version_id.clone(),
        name: Some(meta.name.clone()),
        profile_type: Some(CUSTOM_PROFILE_TYPE.to_string()),
        extra: Default::default(),
    }
}

fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// A fresh 32-character hex profile id.
pub fn generate_profile_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The profile id stored at `path`, if any.
pub async fn read_profile_id(path: &Path) -> ModpackResult<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ModpackError::io(path, e))?;
    let id = raw.trim();
    Ok((!id.is_empty()).then(|| id.to_string()))
}

/// Lowercase `text` into a directory-safe slug of at most `max_len` chars.
///
/// ASCII letters and digits are kept; runs of `-`, `_` and whitespace become a
/// single `-`; everything else is dropped.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '-' || c == '_' || c.is_whitespace() {
            pending_dash = true;
        }
    }
    slug.truncate(max_len);
    slug.trim_end_matches('-').to_string()
}

pub async fn write_profile_id(path: &Path, profile_id: &str) -> ModpackResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ModpackError::io(parent, e))?;
    }
    tokio::fs::write(path, profile_id)
        .await
        .map_err(|e| ModpackError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Written the way the launcher lays the file out, not the way serde would
    // order it.
    const LAUNCHER_WRITTEN: &str = r#"{
  "profiles": {
    "aaa": {
      "name": "Latest release",
      "type": "latest-release",
      "created": "1970-01-02T00:00:00.000Z",
      "lastVersionId": "latest-release"
    },
    "bbb": {
      "name": "Snapshot",
      "type": "latest-snapshot",
      "created": "1970-01-02T00:00:00.000Z",
      "lastVersionId": "latest-snapshot"
    }
  },
  "settings": {
    "crashAssistance": true,
    "enableAdvanced": false
  },
  "selectedUser": {
    "account": "9b1c7e0f",
    "profile": "aaa"
  },
  "version": 3
}"#;

    fn meta(dir: &Path) -> ProfileMeta {
        ProfileMeta {
            name: "Skyblock".into(),
            icon: Some("Grass".into()),
            java_args: "-Xmx4G".into(),
            java_path: Some(dir.join("runtime/bin/javaw")),
            version_id: Some("1.12.2-forge1.12.2-14.23.5.2847".into()),
            game_dir: dir.join("profiles/abc"),
        }
    }

    async fn seeded_manager(dir: &Path) -> ProfileManager {
        let manager = ProfileManager::new(dir);
        tokio::fs::write(manager.profiles_path(), LAUNCHER_WRITTEN)
            .await
            .unwrap();
        manager
    }

    #[tokio::test]
    async fn install_then_remove_restores_registry() {
        let dir = tempfile::tempdir().unwrap();
        let manager = seeded_manager(dir.path()).await;

        manager.install_profile("f00d", &meta(dir.path())).await.unwrap();
        let installed = manager.load().await.unwrap();
        assert_eq!(installed.selected_profile(), Some("f00d"));
        assert_eq!(
            installed.profile_ids().collect::<Vec<_>>(),
            vec!["aaa", "bbb", "f00d"]
        );
        let entry = installed.profile("f00d").unwrap();
        assert_eq!(entry.profile_type.as_deref(), Some("custom"));
        assert_eq!(entry.created, entry.last_used);

        manager.remove_profile("f00d").await.unwrap();
        let after = tokio::fs::read_to_string(manager.profiles_path()).await.unwrap();
        assert_eq!(after, LAUNCHER_WRITTEN);
    }

    #[tokio::test]
    async fn installing_existing_profile_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manager = seeded_manager(dir.path()).await;

        let err = manager
            .install_profile("aaa", &meta(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ModpackError::ProfileAlreadyExists(_)));
    }

    #[tokio::test]
    async fn update_keeps_creation_time() {
        let dir = tempfile::tempdir().unwrap();
        let manager = seeded_manager(dir.path()).await;
        manager.install_profile("f00d", &meta(dir.path())).await.unwrap();
        let created = manager.load().await.unwrap().profile("f00d").unwrap().created;

        let mut changed = meta(dir.path());
        changed.java_args = "-Xmx6G".into();
        manager.update_profile("f00d", &changed).await.unwrap();

        let entry = manager.load().await.unwrap().profile("f00d").unwrap();
        assert_eq!(entry.created, created);
        assert_eq!(entry.java_args.as_deref(), Some("-Xmx6G"));
    }

    #[tokio::test]
    async fn removing_unknown_profile_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let manager = seeded_manager(dir.path()).await;
        let err = manager.remove_profile("nope").await.unwrap_err();
        assert!(matches!(err, ModpackError::ProfileNotFound(_)));
    }

    #[tokio::test]
    async fn removing_active_profile_selects_first_remaining() {
        let dir = tempfile::tempdir().unwrap();
        let manager = seeded_manager(dir.path()).await;

        manager.remove_profile("aaa").await.unwrap();
        assert_eq!(manager.load().await.unwrap().selected_profile(), Some("bbb"));

        manager.remove_profile("bbb").await.unwrap();
        assert_eq!(manager.load().await.unwrap().selected_profile(), None);
    }

    #[tokio::test]
    async fn profile_id_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles/x").join(PROFILE_ID_FILE);
        assert_eq!(read_profile_id(&path).await.unwrap(), None);

        let id = generate_profile_id();
        write_profile_id(&path, &id).await.unwrap();

        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(read_profile_id(&path).await.unwrap(), Some(id));
    }

    #[test]
    fn slugs_are_single_path_components() {
        assert_eq!(slugify("Tom's Sky Block!", 32), "toms-sky-block");
        assert_eq!(slugify("  __Sky -- Block__  ", 32), "sky-block");
        assert_eq!(slugify("../../evil", 32), "evil");
        assert_eq!(slugify("abcdefgh-ijkl", 9), "abcdefgh");
        assert_eq!(slugify("!!!", 32), "");
    }
}
