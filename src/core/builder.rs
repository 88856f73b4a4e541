// ─── Modpack Builder ───
// Runs install / update / uninstall for one manifest and target.
//
// Layout under the install directory:
//   <minecraft>/profiles/<profile slug>/
//     mods/           managed mod jars
//     config/         external resources usually land here
//     runtime/        Java runtime written by the platform step
//     .downloads/     staging area, removed after each install
//     modlist.json    resolution cache
//     profile_id      launcher registry key, generated on first install

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::core::downloader::Downloader;
use crate::core::error::{ModpackError, ModpackResult};
use crate::core::installer::{clean_mods, install_externals, Installer};
use crate::core::manifest::{Manifest, Target};
use crate::core::modlist::{ModListCache, MODLIST_FILE};
use crate::core::orchestrator::{FetchOrchestrator, ItemFailure};
use crate::core::profile::{
    generate_profile_id, read_profile_id, slugify, write_profile_id, ProfileManager, ProfileMeta,
    PROFILE_ID_FILE,
};
use crate::core::progress::RunContext;
use crate::core::registry::RegistryClient;
use crate::core::resolver::ResolvedFile;
use crate::core::settings::{java_args_with_memory, Settings};

const STAGING_DIR: &str = ".downloads";
const PROFILE_SLUG_LEN: usize = 32;
const FALLBACK_SLUG: &str = "modpack";

/// What the platform step needs to set up Java and the mod loader.
#[derive(Debug)]
pub struct PlatformRequest<'a> {
    pub target: Target,
    pub install_dir: &'a Path,
    pub runtime_dir: &'a Path,
    /// Manifest JVM arguments with the heap size for this target applied.
    pub java_args: String,
    pub java_download: Option<&'a str>,
    pub forge_download: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformOutcome {
    /// Java executable the launcher profile should use.
    pub java_path: Option<PathBuf>,
    /// Version id the launcher should start, e.g. `1.12.2-forge-14.23.5.2847`.
    pub version_id: Option<String>,
}

/// Java runtime and mod-loader installation, performed outside this crate.
#[async_trait]
pub trait PlatformStep: Send + Sync {
    async fn run(&self, request: PlatformRequest<'_>) -> ModpackResult<PlatformOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Task {
    CreateModlist,
    CleanMods,
    InstallMods,
    InstallExternals,
    UpdateExternals,
    InstallPlatform,
    InstallProfile,
    UpdateProfile,
    RemoveProfile,
    RemoveFiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Install,
    Update,
    Uninstall,
}

impl Mode {
    pub fn tasks(self) -> &'static [Task] {
        match self {
            Mode::Install => &[
                Task::CreateModlist,
                Task::InstallMods,
                Task::InstallExternals,
                Task::InstallPlatform,
                Task::InstallProfile,
            ],
            Mode::Update => &[
                Task::CreateModlist,
                Task::CleanMods,
                Task::InstallMods,
                Task::UpdateExternals,
                Task::UpdateProfile,
            ],
            Mode::Uninstall => &[Task::RemoveProfile, Task::RemoveFiles],
        }
    }
}

/// Summary of one run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub resolved: usize,
    pub downloaded: Vec<String>,
    pub installed: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub externals_copied: usize,
    pub failures: Vec<ItemFailure>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

pub struct ModpackBuilder {
    manifest: Manifest,
    target: Target,
    minecraft_dir: PathBuf,
    install_dir: Option<PathBuf>,
    package_root: Option<PathBuf>,
    settings: Settings,
    registry: Arc<dyn RegistryClient>,
    client: Client,
    platform_step: Option<Arc<dyn PlatformStep>>,
}

/// Mutable state threaded through the tasks of one run.
#[derive(Default)]
struct RunState {
    resolved: Option<BTreeMap<String, ResolvedFile>>,
    resolution_failed: bool,
    platform: PlatformOutcome,
}

impl ModpackBuilder {
    pub fn new(
        manifest: Manifest,
        minecraft_dir: impl Into<PathBuf>,
        registry: Arc<dyn RegistryClient>,
        client: Client,
    ) -> Self {
        Self {
            manifest,
            target: Target::Client,
            minecraft_dir: minecraft_dir.into(),
            install_dir: None,
            package_root: None,
            settings: Settings::default(),
            registry,
            client,
            platform_step: None,
        }
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Install somewhere other than the profile directory (servers).
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    /// Directory external resource patterns are matched against.
    pub fn with_package_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.package_root = Some(dir.into());
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_platform_step(mut self, step: Arc<dyn PlatformStep>) -> Self {
        self.platform_step = Some(step);
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Directory name of this profile: the manifest's profile id as a slug,
    /// falling back to the profile name.
    pub fn profile_id(&self) -> String {
        [&self.manifest.profile_id, &self.manifest.profile_name]
            .into_iter()
            .flatten()
            .map(|text| slugify(text, PROFILE_SLUG_LEN))
            .find(|slug| !slug.is_empty())
            .unwrap_or_else(|| FALLBACK_SLUG.to_string())
    }

    fn profile_id_path(&self) -> PathBuf {
        self.profile_dir().join(PROFILE_ID_FILE)
    }

    /// Key of this profile in the launcher registry, once an install wrote one.
    pub async fn launcher_profile_id(&self) -> ModpackResult<Option<String>> {
        read_profile_id(&self.profile_id_path()).await
    }

    async fn ensure_launcher_profile_id(&self) -> ModpackResult<String> {
        if let Some(id) = self.launcher_profile_id().await? {
            return Ok(id);
        }
        let id = generate_profile_id();
        write_profile_id(&self.profile_id_path(), &id).await?;
        info!("Generated launcher profile id {} for {}", id, self.profile_id());
        Ok(id)
    }

    /// Change the profile id; every derived path follows.
    pub fn set_profile_id(&mut self, profile_id: impl Into<String>) {
        self.manifest.profile_id = Some(profile_id.into());
    }

    // ── Derived paths ───────────────────────────────────

    pub fn profile_dir(&self) -> PathBuf {
        self.minecraft_dir.join("profiles").join(self.profile_id())
    }

    pub fn install_dir(&self) -> PathBuf {
        self.install_dir
            .clone()
            .unwrap_or_else(|| self.profile_dir())
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.install_dir().join("mods")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.install_dir().join("config")
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.install_dir().join("runtime")
    }

    pub fn modlist_path(&self) -> PathBuf {
        self.install_dir().join(MODLIST_FILE)
    }

    fn staging_dir(&self) -> PathBuf {
        self.install_dir().join(STAGING_DIR)
    }

    fn orchestrator(&self) -> FetchOrchestrator {
        let downloader = Downloader::new(self.client.clone())
            .with_concurrency(self.settings.download_concurrency());
        FetchOrchestrator::new(self.registry.clone(), downloader)
            .with_request_concurrency(self.settings.request_concurrency())
    }

    // ── Runs ────────────────────────────────────────────

    pub async fn run(&self, mode: Mode, ctx: &RunContext) -> ModpackResult<RunReport> {
        info!(
            "Running {:?} for profile {} ({} target) in {:?}",
            mode,
            self.profile_id(),
            self.target,
            self.install_dir()
        );
        self.run_tasks(mode.tasks(), ctx).await
    }

    /// Run `tasks` in their canonical order, each at most once.
    pub async fn run_tasks(&self, tasks: &[Task], ctx: &RunContext) -> ModpackResult<RunReport> {
        let mut tasks = tasks.to_vec();
        tasks.sort();
        tasks.dedup();

        let mut report = RunReport::default();
        let mut state = RunState::default();

        for task in tasks {
            if ctx.is_cancelled() {
                warn!("Run cancelled before {:?}", task);
                report.cancelled = true;
                break;
            }
            debug!("Task {:?}", task);
            self.run_task(task, &mut state, &mut report, ctx).await?;
            if report.cancelled {
                break;
            }
        }

        for failure in &report.failures {
            warn!("Failed: {}", failure);
        }
        info!(
            "Run finished: {} resolved, {} downloaded, {} installed, {} removed, {} failures{}",
            report.resolved,
            report.downloaded.len(),
            report.installed.len(),
            report.removed.len(),
            report.failures.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }

    async fn run_task(
        &self,
        task: Task,
        state: &mut RunState,
        report: &mut RunReport,
        ctx: &RunContext,
    ) -> ModpackResult<()> {
        match task {
            Task::CreateModlist => self.create_modlist(state, report, ctx).await,
            Task::CleanMods => {
                let Some(resolved) = self.ensure_resolved(state, report, ctx).await? else {
                    return Ok(());
                };
                if state.resolution_failed {
                    warn!("Skipping mod cleanup: some mods could not be resolved");
                    return Ok(());
                }
                report.removed.extend(clean_mods(&resolved, &self.mods_dir()).await?);
                Ok(())
            }
            Task::InstallMods => {
                let Some(resolved) = self.ensure_resolved(state, report, ctx).await? else {
                    return Ok(());
                };
                self.install_mods(&resolved, report, ctx).await
            }
            Task::InstallExternals => self.copy_externals(false, report).await,
            Task::UpdateExternals => self.copy_externals(true, report).await,
            Task::InstallPlatform => self.install_platform(state).await,
            Task::InstallProfile => self.write_profile(false, state).await,
            Task::UpdateProfile => self.write_profile(true, state).await,
            Task::RemoveProfile => self.remove_profile().await,
            Task::RemoveFiles => self.remove_files(report).await,
        }
    }

    async fn create_modlist(
        &self,
        state: &mut RunState,
        report: &mut RunReport,
        ctx: &RunContext,
    ) -> ModpackResult<()> {
        let mut cache = ModListCache::load(self.modlist_path()).await?;
        let outcome = self
            .orchestrator()
            .resolve_all(&self.manifest, self.target, &mut cache, ctx)
            .await;

        state.resolution_failed = !outcome.failures.is_empty();
        report.resolved = outcome.resolved.len();
        report.failures.extend(outcome.failures);
        report.failures.extend(outcome.cache_error);
        report.cancelled |= outcome.cancelled;
        if !outcome.cancelled {
            state.resolved = Some(outcome.resolved);
        }
        Ok(())
    }

    async fn ensure_resolved(
        &self,
        state: &mut RunState,
        report: &mut RunReport,
        ctx: &RunContext,
    ) -> ModpackResult<Option<BTreeMap<String, ResolvedFile>>> {
        if state.resolved.is_none() && !report.cancelled {
            self.create_modlist(state, report, ctx).await?;
        }
        Ok(state.resolved.clone())
    }

    async fn install_mods(
        &self,
        resolved: &BTreeMap<String, ResolvedFile>,
        report: &mut RunReport,
        ctx: &RunContext,
    ) -> ModpackResult<()> {
        let mods_dir = self.mods_dir();
        let staging = self.staging_dir();

        let missing: BTreeMap<String, ResolvedFile> = resolved
            .iter()
            .filter(|(_, file)| !mods_dir.join(&file.file_name).exists())
            .map(|(id, file)| (id.clone(), file.clone()))
            .collect();

        let downloads = self.orchestrator().download(&missing, &staging, ctx).await;
        report.downloaded.extend(downloads.downloaded);
        report.failures.extend(downloads.failures);
        report.cancelled |= downloads.cancelled;

        let installed = Installer::new(&staging).install_mods(resolved, &mods_dir).await?;
        report.installed.extend(installed.installed);

        if staging.exists() {
            tokio::fs::remove_dir_all(&staging)
                .await
                .map_err(|e| ModpackError::io(&staging, e))?;
        }
        Ok(())
    }

    async fn copy_externals(&self, allow_overwrite: bool, report: &mut RunReport) -> ModpackResult<()> {
        let resources = &self.manifest.target(self.target).external_resources;
        if resources.is_empty() {
            return Ok(());
        }
        let Some(root) = &self.package_root else {
            warn!("Manifest lists external resources but no package root was given");
            return Ok(());
        };

        let copied = install_externals(resources, root, &self.install_dir(), allow_overwrite).await?;
        report.externals_copied += copied.copied.len();
        Ok(())
    }

    async fn install_platform(&self, state: &mut RunState) -> ModpackResult<()> {
        let Some(step) = &self.platform_step else {
            debug!("No platform step configured, skipping runtime and loader install");
            return Ok(());
        };

        let install_dir = self.install_dir();
        let runtime_dir = self.runtime_dir();
        let request = PlatformRequest {
            target: self.target,
            install_dir: &install_dir,
            runtime_dir: &runtime_dir,
            java_args: self.java_args(),
            java_download: self.manifest.java_downloads.for_current_platform(),
            forge_download: self.manifest.forge_download.as_deref(),
        };
        state.platform = step.run(request).await?;
        info!("Platform step finished: {:?}", state.platform);
        Ok(())
    }

    fn java_args(&self) -> String {
        java_args_with_memory(
            &self.manifest.target(self.target).java_args,
            self.settings.memory_gb(self.target),
        )
    }

    fn profile_meta(&self, state: &RunState) -> ProfileMeta {
        ProfileMeta {
            name: self
                .manifest
                .profile_name
                .clone()
                .unwrap_or_else(|| self.profile_id()),
            icon: self.manifest.profile_icon.clone(),
            java_args: self.java_args(),
            java_path: state.platform.java_path.clone(),
            version_id: state
                .platform
                .version_id
                .clone()
                .or_else(|| self.manifest.version_label.clone()),
            game_dir: self.install_dir(),
        }
    }

    async fn write_profile(&self, update: bool, state: &RunState) -> ModpackResult<()> {
        if self.target != Target::Client {
            debug!("Launcher profiles only apply to the client target");
            return Ok(());
        }

        let launcher_id = self.ensure_launcher_profile_id().await?;
        let manager = ProfileManager::new(&self.minecraft_dir);
        let meta = self.profile_meta(state);
        let result = if update {
            manager.update_profile(&launcher_id, &meta).await
        } else {
            manager.install_profile(&launcher_id, &meta).await
        };
        match result {
            Err(ModpackError::ProfileAlreadyExists(id)) => {
                warn!("Launcher profile {} already present, leaving it unchanged", id);
                Ok(())
            }
            other => other,
        }
    }

    async fn remove_profile(&self) -> ModpackResult<()> {
        if self.target != Target::Client {
            return Ok(());
        }
        let Some(launcher_id) = self.launcher_profile_id().await? else {
            warn!(
                "No launcher profile id under {:?}, nothing to unregister",
                self.profile_dir()
            );
            return Ok(());
        };
        match ProfileManager::new(&self.minecraft_dir)
            .remove_profile(&launcher_id)
            .await
        {
            Ok(_) => Ok(()),
            Err(ModpackError::ProfileNotFound(id)) => {
                warn!("Launcher profile {} was not registered", id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn remove_files(&self, report: &mut RunReport) -> ModpackResult<()> {
        let dir = self.install_dir();
        if !dir.exists() {
            return Ok(());
        }
        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|e| ModpackError::io(&dir, e))?;
        info!("Removed {:?}", dir);
        report.removed.push(dir);
        Ok(())
    }
}
