// ─── Settings ───
// User-tunable knobs persisted as JSON at a caller-chosen path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::warn;

use crate::core::error::{ModpackError, ModpackResult};
use crate::core::manifest::Target;
use crate::core::orchestrator::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY};

pub const SETTINGS_FILE: &str = "modpack_settings.json";

/// Never recommend less than this for the client.
pub const MIN_RECOMMENDED_MEMORY_GB: f64 = 2.0;
/// Never recommend more than this for the client.
pub const MAX_RECOMMENDED_MEMORY_GB: f64 = 8.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Overrides the platform default `.minecraft` directory.
    pub minecraft_dir: Option<PathBuf>,
    pub concurrent_requests: usize,
    pub concurrent_downloads: usize,
    /// JVM heap in GB per target; `None` uses the recommendation for this machine.
    pub client_memory_gb: Option<f64>,
    pub server_memory_gb: Option<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            minecraft_dir: None,
            concurrent_requests: DEFAULT_CONCURRENCY,
            concurrent_downloads: DEFAULT_CONCURRENCY,
            client_memory_gb: None,
            server_memory_gb: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring invalid settings {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> ModpackResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ModpackError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| ModpackError::io(path, e))
    }

    pub fn request_concurrency(&self) -> usize {
        self.concurrent_requests.clamp(1, MAX_CONCURRENCY)
    }

    pub fn download_concurrency(&self) -> usize {
        self.concurrent_downloads.clamp(1, MAX_CONCURRENCY)
    }

    pub fn minecraft_dir(&self) -> Option<PathBuf> {
        self.minecraft_dir.clone().or_else(default_minecraft_dir)
    }

    /// Heap size for `target`, falling back to the recommendation for this machine.
    pub fn memory_gb(&self, target: Target) -> f64 {
        let configured = match target {
            Target::Client => self.client_memory_gb,
            Target::Server => self.server_memory_gb,
        };
        configured.unwrap_or_else(|| {
            let system_gb = system_memory_gb();
            match target {
                Target::Client => recommended_client_memory_gb(system_gb),
                Target::Server => recommended_server_memory_gb(system_gb),
            }
        })
    }
}

/// Platform location of the vanilla launcher's data directory.
pub fn default_minecraft_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        dirs::data_dir().map(|d| d.join(".minecraft"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir().map(|d| d.join("minecraft"))
    } else {
        dirs::home_dir().map(|d| d.join(".minecraft"))
    }
}

/// Total system memory in whole GB, rounded up.
pub fn system_memory_gb() -> u64 {
    let mut system = System::new();
    system.refresh_memory();
    system.total_memory().div_ceil(1024 * 1024 * 1024)
}

/// Heap size suggested for a machine with `system_gb` of memory, before clamping.
pub fn recommended_memory_gb(system_gb: u64) -> f64 {
    let system_gb = system_gb as f64;
    if system_gb == 4.0 {
        3.0
    } else if system_gb < 8.0 {
        system_gb - 2.0
    } else {
        system_gb / 2.0
    }
}

pub fn recommended_client_memory_gb(system_gb: u64) -> f64 {
    recommended_memory_gb(system_gb).clamp(MIN_RECOMMENDED_MEMORY_GB, MAX_RECOMMENDED_MEMORY_GB)
}

/// Servers get no upper bound.
pub fn recommended_server_memory_gb(system_gb: u64) -> f64 {
    recommended_memory_gb(system_gb).max(MIN_RECOMMENDED_MEMORY_GB)
}

/// Prefix `java_args` with `-Xmx` for `memory_gb` unless it already sets one.
pub fn java_args_with_memory(java_args: &str, memory_gb: f64) -> String {
    if java_args.split_whitespace().any(|arg| arg.starts_with("-Xmx")) {
        return java_args.to_string();
    }
    let megabytes = (memory_gb * 1024.0).round() as u64;
    if java_args.trim().is_empty() {
        format!("-Xmx{}M", megabytes)
    } else {
        format!("-Xmx{}M {}", megabytes, java_args.trim())
    }
}
