use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::manifest::ReleaseType;

/// Project links returned by the registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryUrls {
    #[serde(default)]
    pub curseforge: Option<String>,
}

/// A registry project with every file it has published.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryMod {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub urls: RegistryUrls,
    #[serde(default)]
    pub files: Vec<RegistryFile>,
}

/// One uploaded artifact of a registry project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryFile {
    pub id: u64,
    /// Artifact file name, e.g. `jei_1.12.2-4.15.0.291.jar`.
    pub name: String,
    #[serde(rename = "type")]
    pub release_type: ReleaseType,
    #[serde(default)]
    pub versions: Vec<String>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, alias = "filesize")]
    pub size: Option<u64>,
}

impl RegistryFile {
    pub fn supports_any(&self, game_versions: &[String]) -> bool {
        self.versions.iter().any(|v| game_versions.contains(v))
    }
}

impl RegistryMod {
    pub fn project_url(&self) -> Option<&str> {
        self.urls.curseforge.as_deref()
    }

    /// Drop files whose id was already seen; the first occurrence wins.
    pub fn dedup_files(&mut self) {
        let mut seen = HashSet::new();
        let before = self.files.len();
        self.files.retain(|file| seen.insert(file.id));
        if self.files.len() != before {
            warn!(
                "Registry listed duplicate file ids for '{}'; kept {} of {}",
                self.title,
                self.files.len(),
                before
            );
        }
    }
}

/// Download location of a registry file: `{base}/{id[0:4]}/{id[4:7]}/{name}`.
pub fn download_url(download_base: &str, file_id: u64, file_name: &str) -> String {
    let id = file_id.to_string();
    let (head, tail) = id.split_at(id.len().min(4));
    let mid = &tail[..tail.len().min(3)];
    format!(
        "{}/{}/{}/{}",
        download_base.trim_end_matches('/'),
        head,
        mid,
        file_name
    )
}
