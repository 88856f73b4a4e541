// ─── Resolver ───
// Pure selection of the single file to install for a mod.

use std::cmp::{Ordering, Reverse};
use std::path::{Component, Path};

use crate::core::error::{ModpackError, ModpackResult};
use crate::core::manifest::{ReleaseType, VersionPreference};
use crate::core::registry::RegistryFile;

/// The concrete artifact chosen for one mod identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub identifier: String,
    /// Registry file id; `None` for externally hosted mods.
    pub file_id: Option<u64>,
    pub file_name: String,
    pub download_url: String,
    pub release_type: Option<ReleaseType>,
    pub size: Option<u64>,
}

/// Whether `name` is a single path component, safe to join onto a directory.
pub fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Reject file names from the registry, cache or manifest that would escape
/// the directory they are written to.
pub fn ensure_plain_file_name(identifier: &str, file_name: &str) -> ModpackResult<()> {
    if is_plain_file_name(file_name) {
        Ok(())
    } else {
        Err(ModpackError::UnsafeFileName {
            identifier: identifier.to_string(),
            file_name: file_name.to_string(),
        })
    }
}

/// Pick the best file among `files`.
///
/// An explicit file id returns that file or nothing. Otherwise the newest
/// compatible file of each release type becomes a candidate, and candidates
/// are ordered by distance from the preferred type (anything at least as
/// stable counts as distance zero), then by upload time, newest first.
pub fn best_file<'a>(
    files: &'a [RegistryFile],
    compatible_versions: &[String],
    preference: VersionPreference,
) -> Option<&'a RegistryFile> {
    let preferred = match preference {
        VersionPreference::FileId(id) => return files.iter().find(|file| file.id == id),
        VersionPreference::ReleaseType(release_type) => release_type,
    };

    let mut candidates: Vec<&RegistryFile> = ReleaseType::ALL
        .iter()
        .filter_map(|release_type| newest_of_type(files, compatible_versions, *release_type))
        .collect();

    candidates.sort_by(|a, b| {
        let key = |file: &RegistryFile| {
            (
                type_distance(preferred, file.release_type),
                Reverse(file.uploaded_at),
                Reverse(file.release_type.stability()),
                Reverse(file.id),
            )
        };
        key(*a).cmp(&key(*b))
    });

    candidates.into_iter().next()
}

/// Like [`best_file`], with the failure mapped to the matching not-found error.
pub fn resolve_file<'a>(
    identifier: &str,
    files: &'a [RegistryFile],
    compatible_versions: &[String],
    preference: VersionPreference,
) -> ModpackResult<&'a RegistryFile> {
    best_file(files, compatible_versions, preference).ok_or_else(|| match preference {
        VersionPreference::FileId(file_id) => ModpackError::FileNotFound {
            identifier: identifier.to_string(),
            file_id,
        },
        VersionPreference::ReleaseType(_) => ModpackError::NoCompatibleFile {
            identifier: identifier.to_string(),
        },
    })
}

fn newest_of_type<'a>(
    files: &'a [RegistryFile],
    compatible_versions: &[String],
    release_type: ReleaseType,
) -> Option<&'a RegistryFile> {
    files
        .iter()
        .filter(|file| file.release_type == release_type && file.supports_any(compatible_versions))
        .max_by(|a, b| match a.uploaded_at.cmp(&b.uploaded_at) {
            Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        })
}

fn type_distance(preferred: ReleaseType, candidate: ReleaseType) -> u8 {
    preferred
        .stability()
        .saturating_sub(candidate.stability())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn only_single_component_names_are_plain() {
        assert!(is_plain_file_name("jei_1.12.2-4.15.0.291.jar"));
        assert!(!is_plain_file_name("../../../escaped.jar"));
        assert!(!is_plain_file_name("mods/jei.jar"));
        assert!(!is_plain_file_name("/etc/passwd"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(""));

        let err = ensure_plain_file_name("jei", "../jei.jar").unwrap_err();
        assert!(matches!(err, ModpackError::UnsafeFileName { .. }));
    }

    fn file(id: u64, release_type: ReleaseType, versions: &[&str], uploaded: i64) -> RegistryFile {
        RegistryFile {
            id,
            name: format!("mod-{}.jar", id),
            release_type,
            versions: versions.iter().map(|v| v.to_string()).collect(),
            uploaded_at: Utc.timestamp_opt(uploaded, 0).unwrap(),
            size: None,
        }
    }

    fn versions(list: &[&str]) -> Vec<String> {
        list.iter().map(|v| v.to_string()).collect()
    }

    fn prefer(release_type: ReleaseType) -> VersionPreference {
        VersionPreference::ReleaseType(release_type)
    }

    #[test]
    fn stable_file_beats_newer_beta_when_release_preferred() {
        let files = vec![
            file(1, ReleaseType::Release, &["1.12.2"], 100),
            file(2, ReleaseType::Beta, &["1.12.2"], 200),
        ];
        let chosen = best_file(&files, &versions(&["1.12.2"]), prefer(ReleaseType::Release));
        assert_eq!(chosen.map(|f| f.id), Some(1));
    }

    #[test]
    fn falls_back_to_looser_type() {
        let files = vec![
            file(1, ReleaseType::Alpha, &["1.12.2"], 300),
            file(2, ReleaseType::Beta, &["1.12.2"], 200),
        ];
        let chosen = best_file(&files, &versions(&["1.12.2"]), prefer(ReleaseType::Release));
        assert_eq!(chosen.map(|f| f.id), Some(2));
    }

    #[test]
    fn newest_wins_inside_acceptable_tier() {
        let files = vec![
            file(1, ReleaseType::Release, &["1.12.2"], 100),
            file(2, ReleaseType::Beta, &["1.12.2"], 200),
            file(3, ReleaseType::Alpha, &["1.12.2"], 300),
        ];
        let chosen = best_file(&files, &versions(&["1.12.2"]), prefer(ReleaseType::Beta));
        assert_eq!(chosen.map(|f| f.id), Some(2));

        let chosen = best_file(&files, &versions(&["1.12.2"]), prefer(ReleaseType::Alpha));
        assert_eq!(chosen.map(|f| f.id), Some(3));
    }

    #[test]
    fn ignores_incompatible_versions() {
        let files = vec![
            file(1, ReleaseType::Release, &["1.16.5"], 500),
            file(2, ReleaseType::Release, &["1.12.1"], 100),
        ];
        let chosen = best_file(
            &files,
            &versions(&["1.12.2", "1.12.1"]),
            prefer(ReleaseType::Release),
        );
        assert_eq!(chosen.map(|f| f.id), Some(2));
    }

    #[test]
    fn pinned_file_id_ignores_compatibility() {
        let files = vec![
            file(1, ReleaseType::Alpha, &["1.7.10"], 100),
            file(2, ReleaseType::Release, &["1.12.2"], 200),
        ];
        let chosen = best_file(&files, &versions(&["1.12.2"]), VersionPreference::FileId(1));
        assert_eq!(chosen.map(|f| f.id), Some(1));

        let err = resolve_file("jei", &files, &versions(&["1.12.2"]), VersionPreference::FileId(9))
            .unwrap_err();
        assert!(matches!(err, ModpackError::FileNotFound { file_id: 9, .. }));
    }

    #[test]
    fn nothing_compatible_is_not_found() {
        let files = vec![file(1, ReleaseType::Release, &["1.16.5"], 100)];
        let err = resolve_file("jei", &files, &versions(&["1.12.2"]), prefer(ReleaseType::Release))
            .unwrap_err();
        assert!(matches!(err, ModpackError::NoCompatibleFile { .. }));
    }

    #[test]
    fn deterministic_under_input_order() {
        let mut files = vec![
            file(1, ReleaseType::Release, &["1.12.2"], 100),
            file(2, ReleaseType::Release, &["1.12.2"], 100),
            file(3, ReleaseType::Beta, &["1.12.2"], 100),
        ];
        let compatible = versions(&["1.12.2"]);
        let first = best_file(&files, &compatible, prefer(ReleaseType::Beta)).map(|f| f.id);
        files.reverse();
        let second = best_file(&files, &compatible, prefer(ReleaseType::Beta)).map(|f| f.id);
        assert_eq!(first, Some(2));
        assert_eq!(first, second);
    }
}
