pub mod mod_ref;
pub mod model;

pub use mod_ref::{RegistryModRef, ReleaseType, VersionPreference};
pub use model::{ExternalModRef, ExternalResources, JavaDownloads, Manifest, Target, TargetSpec};
