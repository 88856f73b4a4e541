pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::builder::{
    Mode, ModpackBuilder, PlatformOutcome, PlatformRequest, PlatformStep, RunReport, Task,
};
pub use crate::core::error::{ErrorCategory, ModpackError, ModpackResult};
pub use crate::core::http::build_http_client;
pub use crate::core::manifest::{Manifest, Target};
pub use crate::core::package::ModpackPackage;
pub use crate::core::progress::{NoopProgress, ProgressSink, RunContext};
pub use crate::core::registry::{HttpRegistryClient, RegistryClient};
pub use crate::core::settings::Settings;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,modpack_builder=debug")),
        )
        .try_init();

    tracing::info!("Modpack builder v{} logging initialized", env!("CARGO_PKG_VERSION"));
}
