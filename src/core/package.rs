// ─── Modpack Package ───
// A distributable modpack: a zip archive or directory holding `manifest.json`,
// an optional README and the external resources the manifest refers to.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::core::error::{ModpackError, ModpackResult};
use crate::core::manifest::Manifest;

pub const MANIFEST_FILE: &str = "manifest.json";
const README_STEM: &str = "readme";
const README_EXTENSIONS: [&str; 6] = ["txt", "md", "mkd", "mkdn", "mdown", "markdown"];

#[derive(Debug, Clone)]
pub struct ModpackPackage {
    /// Directory external resource patterns are resolved against.
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub readme: Option<PathBuf>,
}

impl ModpackPackage {
    /// Open a package. Archives are extracted into `workdir` first;
    /// directories are used in place.
    pub fn open(path: &Path, workdir: &Path) -> ModpackResult<Self> {
        let root = if path.is_dir() {
            path.to_path_buf()
        } else {
            extract_archive(path, workdir)?;
            workdir.to_path_buf()
        };

        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(ModpackError::ManifestParse(format!(
                "package {:?} has no {}",
                path, MANIFEST_FILE
            )));
        }

        let readme = find_readme(&root)?;
        info!("Opened modpack package {:?} (readme: {:?})", root, readme);
        Ok(Self {
            root,
            manifest_path,
            readme,
        })
    }

    pub async fn load_manifest(&self) -> ModpackResult<Manifest> {
        Manifest::load(&self.manifest_path).await
    }
}

fn extract_archive(archive_path: &Path, dest: &Path) -> ModpackResult<()> {
    let file = File::open(archive_path).map_err(|e| ModpackError::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;

    std::fs::create_dir_all(dest).map_err(|e| ModpackError::io(dest, e))?;

    for index in 0..archive.len() {
        let mut zipped = archive.by_index(index)?;
        let relative = zipped
            .enclosed_name()
            .ok_or_else(|| ModpackError::Other(format!("Unsafe zip entry: {}", zipped.name())))?;
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(ModpackError::Other(format!(
                "Unsafe zip entry: {}",
                zipped.name()
            )));
        }

        let out_path = dest.join(&relative);
        if zipped.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| ModpackError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ModpackError::io(parent, e))?;
        }

        let mut out = File::create(&out_path).map_err(|e| ModpackError::io(&out_path, e))?;
        std::io::copy(&mut zipped, &mut out).map_err(|e| ModpackError::io(&out_path, e))?;
    }

    debug!("Extracted {} entries from {:?}", archive.len(), archive_path);
    Ok(())
}

fn find_readme(root: &Path) -> ModpackResult<Option<PathBuf>> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(root).map_err(|e| ModpackError::io(root, e))? {
        let path = entry.map_err(|e| ModpackError::io(root, e))?.path();
        if !path.is_file() {
            continue;
        }
        let stem_matches = path
            .file_stem()
            .is_some_and(|stem| stem.to_string_lossy().eq_ignore_ascii_case(README_STEM));
        let extension_matches = path.extension().is_some_and(|ext| {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            README_EXTENSIONS.contains(&ext.as_str())
        });
        if stem_matches && extension_matches {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}
