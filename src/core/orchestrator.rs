// ─── Fetch Orchestrator ───
// Bounded-concurrency metadata resolution and artifact download.
//
// Workers only return results; the coordinator folds them into the
// resolved map, the failure list and the modlist cache.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{ErrorCategory, ModpackError, ModpackResult};
use crate::core::manifest::{ExternalModRef, Manifest, RegistryModRef, Target, VersionPreference};
use crate::core::modlist::{LockEntry, ModListCache, MODLIST_FILE};
use crate::core::progress::RunContext;
use crate::core::registry::RegistryClient;
use crate::core::resolver::{ensure_plain_file_name, resolve_file, ResolvedFile};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const MAX_CONCURRENCY: usize = 16;

/// A single mod that could not be resolved or downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub identifier: String,
    pub category: ErrorCategory,
    pub message: String,
}

impl ItemFailure {
    pub fn new(identifier: impl Into<String>, error: &ModpackError) -> Self {
        Self {
            identifier: identifier.into(),
            category: error.category(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.identifier, self.category, self.message)
    }
}

#[derive(Debug, Default)]
pub struct ResolveOutcome {
    pub resolved: BTreeMap<String, ResolvedFile>,
    pub failures: Vec<ItemFailure>,
    /// Number of identifiers that needed a registry round trip.
    pub fetched: usize,
    pub cancelled: bool,
    /// Set when the resolved entries could not be written to `modlist.json`.
    pub cache_error: Option<ItemFailure>,
}

#[derive(Debug, Default)]
pub struct DownloadOutcome {
    pub downloaded: Vec<String>,
    /// Already on disk, not requested again.
    pub present: Vec<String>,
    pub failures: Vec<ItemFailure>,
    pub cancelled: bool,
}

enum PendingLookup<'a> {
    Registry(&'a RegistryModRef, VersionPreference),
    External(&'a ExternalModRef),
}

impl PendingLookup<'_> {
    fn identifier(&self) -> &str {
        match self {
            PendingLookup::Registry(mod_ref, _) => &mod_ref.identifier,
            PendingLookup::External(external) => &external.identifier,
        }
    }
}

pub struct FetchOrchestrator {
    registry: Arc<dyn RegistryClient>,
    downloader: Downloader,
    request_concurrency: usize,
}

impl FetchOrchestrator {
    pub fn new(registry: Arc<dyn RegistryClient>, downloader: Downloader) -> Self {
        Self {
            registry,
            downloader,
            request_concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_request_concurrency(mut self, n: usize) -> Self {
        self.request_concurrency = n.clamp(1, MAX_CONCURRENCY);
        self
    }

    /// Resolve every mod of `target` to a concrete file.
    ///
    /// Identifiers already in `cache` (and still matching their pin) skip the
    /// registry. New entries are merged into the cache and saved once at the
    /// end; a cancelled run discards them and leaves the cache file untouched.
    /// Per-item errors, including a failed cache write, end up in the outcome.
    pub async fn resolve_all(
        &self,
        manifest: &Manifest,
        target: Target,
        cache: &mut ModListCache,
        ctx: &RunContext,
    ) -> ResolveOutcome {
        let spec = manifest.target(target);
        let mut outcome = ResolveOutcome::default();
        let mut pending = Vec::new();

        for (identifier, mod_ref) in &spec.registry_mods {
            let preference = manifest.effective_preference(mod_ref);
            let cached = cache
                .get(identifier)
                .filter(|entry| !entry.external && entry.satisfies(preference))
                .and_then(|entry| cached_file(identifier, entry));
            match cached {
                Some(file) => {
                    outcome.resolved.insert(identifier.clone(), file);
                }
                None => pending.push(PendingLookup::Registry(mod_ref, preference)),
            }
        }
        for (identifier, external) in &spec.external_mods {
            let cached = cache
                .get(identifier)
                .filter(|entry| entry.external && entry.file_url == external.url)
                .and_then(|entry| cached_file(identifier, entry));
            match cached {
                Some(file) => {
                    outcome.resolved.insert(identifier.clone(), file);
                }
                None => pending.push(PendingLookup::External(external)),
            }
        }

        outcome.fetched = pending.len();
        info!(
            "Resolving {} {} mods: {} cached, {} to fetch (concurrency={})",
            spec.mod_count(),
            target,
            outcome.resolved.len(),
            pending.len(),
            self.request_concurrency
        );
        ctx.progress.set_total("resolve", pending.len() as u64);

        let game_versions = manifest.game_versions.as_slice();
        let results: Vec<(String, Option<ModpackResult<(LockEntry, ResolvedFile)>>)> =
            stream::iter(pending)
                .map(|item| async move {
                    let identifier = item.identifier().to_string();
                    if ctx.is_cancelled() {
                        return (identifier, None);
                    }
                    let result = self.lookup(&item, game_versions).await;
                    ctx.progress.advance(1);
                    (identifier, Some(result))
                })
                .buffer_unordered(self.request_concurrency)
                .collect()
                .await;
        ctx.progress.done();

        let mut fresh = Vec::new();
        for (identifier, result) in results {
            match result {
                Some(Ok((entry, file))) => fresh.push((identifier, entry, file)),
                Some(Err(e)) => {
                    warn!("Could not resolve '{}': {}", identifier, e);
                    outcome.failures.push(ItemFailure::new(identifier, &e));
                }
                None => {
                    debug!("Skipped '{}' after cancellation", identifier);
                    outcome
                        .failures
                        .push(ItemFailure::new(identifier, &ModpackError::Cancelled));
                }
            }
        }

        if ctx.is_cancelled() {
            warn!(
                "Resolution cancelled; discarding {} new modlist entries",
                fresh.len()
            );
            outcome.cancelled = true;
            return outcome;
        }

        let mut entries = Vec::with_capacity(fresh.len());
        for (identifier, entry, file) in fresh {
            outcome.resolved.insert(identifier.clone(), file);
            entries.push((identifier, entry));
        }
        cache.merge(entries);
        if let Err(e) = cache.save().await {
            warn!("Could not save modlist {:?}: {}", cache.path(), e);
            outcome.cache_error = Some(ItemFailure::new(MODLIST_FILE, &e));
        }

        info!(
            "Resolved {} mods, {} failures",
            outcome.resolved.len(),
            outcome.failures.len()
        );
        outcome
    }

    async fn lookup(
        &self,
        item: &PendingLookup<'_>,
        game_versions: &[String],
    ) -> ModpackResult<(LockEntry, ResolvedFile)> {
        let entry = match item {
            PendingLookup::Registry(mod_ref, preference) => {
                let registry_mod = self.registry.fetch_metadata(&mod_ref.identifier).await?;
                let file = resolve_file(
                    &mod_ref.identifier,
                    &registry_mod.files,
                    game_versions,
                    *preference,
                )?;
                debug!(
                    "'{}' -> {} ({}, {})",
                    mod_ref.identifier, file.name, file.id, file.release_type
                );
                let url = self.registry.download_url(file);
                LockEntry::from_registry(&registry_mod, file, url)
            }
            PendingLookup::External(external) => {
                let info = self.registry.head_external(&external.url).await?;
                LockEntry::from_external(&external.url, &info, external.file.as_deref())
            }
        };
        let file = entry.to_resolved(item.identifier())?;
        Ok((entry, file))
    }

    /// Download every resolved file missing from `dest_dir`.
    pub async fn download(
        &self,
        resolved: &BTreeMap<String, ResolvedFile>,
        dest_dir: &Path,
        ctx: &RunContext,
    ) -> DownloadOutcome {
        let mut outcome = DownloadOutcome::default();
        let mut entries = Vec::new();

        for file in resolved.values() {
            if let Err(e) = ensure_plain_file_name(&file.identifier, &file.file_name) {
                warn!("{}", e);
                outcome.failures.push(ItemFailure::new(file.identifier.clone(), &e));
                continue;
            }
            let dest = dest_dir.join(&file.file_name);
            if dest.exists() {
                outcome.present.push(file.identifier.clone());
            } else {
                entries.push(DownloadEntry {
                    id: file.identifier.clone(),
                    url: file.download_url.clone(),
                    dest,
                });
            }
        }

        let report = self.downloader.download_batch(entries, ctx).await;
        outcome.downloaded = report.completed.into_iter().map(|e| e.id).collect();
        outcome.failures.extend(
            report
                .failed
                .iter()
                .map(|(entry, e)| ItemFailure::new(entry.id.clone(), e)),
        );
        outcome.failures.extend(
            report
                .skipped
                .into_iter()
                .map(|entry| ItemFailure::new(entry.id, &ModpackError::Cancelled)),
        );
        outcome.cancelled = ctx.is_cancelled();
        outcome
    }
}

/// A cached entry usable in place of a lookup, or `None` when it has to be refetched.
fn cached_file(identifier: &str, entry: &LockEntry) -> Option<ResolvedFile> {
    match entry.to_resolved(identifier) {
        Ok(file) => Some(file),
        Err(e) => {
            warn!("Ignoring cached entry: {}", e);
            None
        }
    }
}
