// ─── Modpack Core ───
// Resolution and install engine for declarative Minecraft modpacks.
//
// Architecture:
//   core/
//     manifest/    Manifest model + `identifier[:version]` references
//     registry/    Registry metadata client + CDN download URLs
//     resolver     Pure best-file selection
//     modlist      Persisted resolution cache (modlist.json)
//     downloader/  Concurrent, size-checked downloads
//     orchestrator Bounded-concurrency resolve + download phases
//     installer    Mods, stale-mod cleanup, external resources
//     profile/     launcher_profiles.json registry
//     package      Zip / directory modpack packages
//     settings     Concurrency, memory and directory settings
//     builder      Install / update / uninstall runs

pub mod builder;
pub mod downloader;
pub mod error;
pub mod http;
pub mod installer;
pub mod manifest;
pub mod modlist;
pub mod orchestrator;
pub mod package;
pub mod profile;
pub mod progress;
pub mod registry;
pub mod resolver;
pub mod settings;
