// ─── Registry Client ───
// Fetches project metadata from the mod registry API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::LAST_MODIFIED;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info};

use super::model::{download_url, RegistryFile, RegistryMod};
use crate::core::error::{ModpackError, ModpackResult};

pub const REGISTRY_API_BASE: &str = "https://api.cfwidget.com/minecraft/mc-mods";
pub const REGISTRY_DOWNLOAD_BASE: &str = "https://edge.forgecdn.net/files";

/// What a HEAD request tells us about an externally hosted mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalFileInfo {
    pub file_name: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Source of mod metadata. One call per lookup, no retries.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Metadata for `identifier`, or `ModNotFound` when the registry has no such project.
    async fn fetch_metadata(&self, identifier: &str) -> ModpackResult<RegistryMod>;

    /// Lock information for a mod hosted outside the registry.
    async fn head_external(&self, url: &str) -> ModpackResult<ExternalFileInfo> {
        Ok(ExternalFileInfo {
            file_name: file_name_from_url(url)?,
            last_modified: None,
        })
    }

    fn download_url(&self, file: &RegistryFile) -> String {
        download_url(REGISTRY_DOWNLOAD_BASE, file.id, &file.name)
    }
}

/// Registry client backed by the public cfwidget API.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    client: Client,
    api_base: String,
    download_base: String,
}

impl HttpRegistryClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_base: REGISTRY_API_BASE.to_string(),
            download_base: REGISTRY_DOWNLOAD_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_download_base(mut self, download_base: impl Into<String>) -> Self {
        self.download_base = download_base.into();
        self
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn fetch_metadata(&self, identifier: &str) -> ModpackResult<RegistryMod> {
        let url = format!("{}/{}", self.api_base.trim_end_matches('/'), identifier);
        debug!("Fetching registry metadata: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ModpackError::ModNotFound(identifier.to_string()));
        }
        if !status.is_success() {
            return Err(ModpackError::RequestFailed {
                url,
                status: status.as_u16(),
            });
        }

        let mut registry_mod: RegistryMod = response.json().await?;
        registry_mod.dedup_files();

        info!(
            "Registry: '{}' ({}) has {} files",
            identifier,
            registry_mod.id,
            registry_mod.files.len()
        );
        Ok(registry_mod)
    }

    async fn head_external(&self, url: &str) -> ModpackResult<ExternalFileInfo> {
        let response = self.client.head(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ModpackError::RequestFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
            .map(|value| value.with_timezone(&Utc));

        // Named after the requested URL; mirrors may redirect to opaque blob paths.
        Ok(ExternalFileInfo {
            file_name: file_name_from_url(url)?,
            last_modified,
        })
    }

    fn download_url(&self, file: &RegistryFile) -> String {
        download_url(&self.download_base, file.id, &file.name)
    }
}

/// Last non-empty path segment of `url`.
pub fn file_name_from_url(url: &str) -> ModpackResult<String> {
    let parsed =
        Url::parse(url).map_err(|e| ModpackError::Other(format!("Invalid URL {}: {}", url, e)))?;
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| ModpackError::Other(format!("Cannot derive a file name from {}", url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(
            file_name_from_url("https://example.com/mods/OptiFine_1.12.2.jar?x=1").unwrap(),
            "OptiFine_1.12.2.jar"
        );
        assert_eq!(
            file_name_from_url("https://example.com/a/b.jar/").unwrap(),
            "b.jar"
        );
        assert!(file_name_from_url("https://example.com/").is_err());
        assert!(file_name_from_url("not a url").is_err());
    }

    #[tokio::test]
    async fn external_name_ignores_redirect_target() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/releases/OptiFine_1.12.2.jar"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/blob/8f3a2c9e", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(path("/blob/8f3a2c9e"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", "Sun, 27 Oct 2019 14:36:10 GMT"),
            )
            .mount(&server)
            .await;

        let registry = HttpRegistryClient::new(Client::new());
        let info = registry
            .head_external(&format!("{}/releases/OptiFine_1.12.2.jar", server.uri()))
            .await
            .unwrap();

        assert_eq!(info.file_name, "OptiFine_1.12.2.jar");
        assert_eq!(
            info.last_modified.map(|t| t.timestamp()),
            Some(1_572_186_970)
        );
    }
}
