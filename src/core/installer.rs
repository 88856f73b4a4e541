// ─── Installer ───
// Idempotent materialization of resolved mods and external resources.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::error::{ModpackError, ModpackResult};
use crate::core::manifest::ExternalResources;
use crate::core::resolver::{is_plain_file_name, ResolvedFile};

/// Only files with this extension in a mods directory are managed by us.
pub const MANAGED_EXTENSION: &str = "jar";

#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<PathBuf>,
    /// Already present in the destination.
    pub skipped: Vec<PathBuf>,
    /// Resolved but absent from the staging directory (download failed).
    pub missing: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ExternalsReport {
    pub copied: Vec<PathBuf>,
    /// Matched but left alone because the destination already had them.
    pub kept: Vec<PathBuf>,
}

/// Moves downloaded artifacts from a staging directory into place.
#[derive(Debug, Clone)]
pub struct Installer {
    staging_dir: PathBuf,
}

impl Installer {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Move each resolved file into `dest_dir` unless a file of that name is already there.
    pub async fn install_mods(
        &self,
        resolved: &BTreeMap<String, ResolvedFile>,
        dest_dir: &Path,
    ) -> ModpackResult<InstallReport> {
        create_dir(dest_dir).await?;
        let mut report = InstallReport::default();

        for file in resolved.values() {
            if !is_plain_file_name(&file.file_name) {
                warn!(
                    "'{}' has unsafe file name {:?}, not installing",
                    file.identifier, file.file_name
                );
                report.missing.push(file.identifier.clone());
                continue;
            }
            let dest = dest_dir.join(&file.file_name);
            if dest.exists() {
                report.skipped.push(dest);
                continue;
            }

            let staged = self.staging_dir.join(&file.file_name);
            if !staged.exists() {
                warn!("'{}' has no staged file {:?}", file.identifier, staged);
                report.missing.push(file.identifier.clone());
                continue;
            }

            move_file(&staged, &dest).await?;
            debug!("Installed {:?}", dest);
            report.installed.push(dest);
        }

        info!(
            "Installed {} mods into {:?} ({} already present, {} missing)",
            report.installed.len(),
            dest_dir,
            report.skipped.len(),
            report.missing.len()
        );
        Ok(report)
    }
}

/// Remove managed files from `dest_dir` that are not among the resolved file names.
pub async fn clean_mods(
    resolved: &BTreeMap<String, ResolvedFile>,
    dest_dir: &Path,
) -> ModpackResult<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if !dest_dir.exists() {
        return Ok(removed);
    }

    let keep: HashSet<&str> = resolved.values().map(|f| f.file_name.as_str()).collect();
    let mut entries = tokio::fs::read_dir(dest_dir)
        .await
        .map_err(|e| ModpackError::io(dest_dir, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ModpackError::io(dest_dir, e))?
    {
        let path = entry.path();
        let managed = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(MANAGED_EXTENSION));
        if !managed || !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        if keep.contains(name.to_string_lossy().as_ref()) {
            continue;
        }

        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| ModpackError::io(&path, e))?;
        debug!("Removed stale mod {:?}", path);
        removed.push(path);
    }

    info!("Cleaned {} stale mods from {:?}", removed.len(), dest_dir);
    Ok(removed)
}

/// Copy files matching the resource patterns from `source_root` into `dest_dir`.
///
/// Immutable matches are copied only when absent. Overwrite matches are
/// replaced when `allow_overwrite` is set. A path matched by both is immutable.
pub async fn install_externals(
    resources: &ExternalResources,
    source_root: &Path,
    dest_dir: &Path,
    allow_overwrite: bool,
) -> ModpackResult<ExternalsReport> {
    let immutable = expand_patterns(source_root, &resources.immutable)?;
    let overwrite: BTreeSet<PathBuf> = expand_patterns(source_root, &resources.overwrite)?
        .difference(&immutable)
        .cloned()
        .collect();

    let mut report = ExternalsReport::default();
    let buckets = [(&immutable, false), (&overwrite, allow_overwrite)];
    for (paths, replace) in buckets {
        for relative in paths {
            let dest = dest_dir.join(relative);
            if dest.exists() && !replace {
                report.kept.push(relative.clone());
                continue;
            }
            if let Some(parent) = dest.parent() {
                create_dir(parent).await?;
            }
            let source = source_root.join(relative);
            tokio::fs::copy(&source, &dest)
                .await
                .map_err(|e| ModpackError::io(&source, e))?;
            report.copied.push(relative.clone());
        }
    }

    info!(
        "External resources: {} copied, {} kept",
        report.copied.len(),
        report.kept.len()
    );
    Ok(report)
}

/// Files under `root` matched by `patterns`, relative to `root`. Matched
/// directories contribute every file beneath them.
fn expand_patterns<'a>(
    root: &Path,
    patterns: impl IntoIterator<Item = &'a String>,
) -> ModpackResult<BTreeSet<PathBuf>> {
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    let mut files = BTreeSet::new();

    for pattern in patterns {
        let full = format!(
            "{}/{}",
            escaped_root.trim_end_matches(['/', '\\']),
            pattern.trim_start_matches(['/', '\\'])
        );
        for entry in glob::glob(&full)? {
            match entry {
                Ok(path) => collect_files(&path, root, &mut files)?,
                Err(e) => warn!("Skipping unreadable match for '{}': {}", pattern, e),
            }
        }
    }

    Ok(files)
}

fn collect_files(path: &Path, root: &Path, out: &mut BTreeSet<PathBuf>) -> ModpackResult<()> {
    if path.is_dir() {
        for entry in std::fs::read_dir(path).map_err(|e| ModpackError::io(path, e))? {
            let entry = entry.map_err(|e| ModpackError::io(path, e))?;
            collect_files(&entry.path(), root, out)?;
        }
    } else if path.is_file() {
        let Ok(relative) = path.strip_prefix(root) else {
            return Ok(());
        };
        if relative.components().all(|c| matches!(c, Component::Normal(_))) {
            out.insert(relative.to_path_buf());
        } else {
            warn!("Ignoring resource outside the package: {:?}", path);
        }
    }
    Ok(())
}

async fn create_dir(path: &Path) -> ModpackResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ModpackError::io(path, e))
}

async fn move_file(source: &Path, dest: &Path) -> ModpackResult<()> {
    if tokio::fs::rename(source, dest).await.is_ok() {
        return Ok(());
    }
    // Staging and destination may live on different filesystems.
    tokio::fs::copy(source, dest)
        .await
        .map_err(|e| ModpackError::io(source, e))?;
    tokio::fs::remove_file(source)
        .await
        .map_err(|e| ModpackError::io(source, e))
}
