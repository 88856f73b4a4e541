pub mod client;
pub mod model;

pub use client::{
    file_name_from_url, ExternalFileInfo, HttpRegistryClient, RegistryClient, REGISTRY_API_BASE,
    REGISTRY_DOWNLOAD_BASE,
};
pub use model::{download_url, RegistryFile, RegistryMod, RegistryUrls};
