use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use modpack_builder::core::modlist::ModListCache;
use modpack_builder::core::profile::ProfileManager;
use modpack_builder::{
    build_http_client, HttpRegistryClient, Manifest, Mode, ModpackBuilder, RunContext, Settings,
};

const JAR_BYTES: &[u8] = b"PK\x03\x04 example mod";

fn registry_payload() -> serde_json::Value {
    json!({
        "id": 123456,
        "title": "Example Mod",
        "urls": { "curseforge": "https://www.curseforge.com/minecraft/mc-mods/examplemod" },
        "files": [
            {
                "id": 2900100,
                "name": "example-2.0-beta.jar",
                "type": "beta",
                "versions": ["1.12.2"],
                "uploaded_at": "2020-03-01T10:00:00Z"
            },
            {
                "id": 2803400,
                "name": "example-1.0.jar",
                "type": "release",
                "versions": ["1.12.1"],
                "uploaded_at": "2019-10-27T14:36:10Z"
            }
        ]
    })
}

fn manifest(mods: &[&str]) -> Manifest {
    Manifest::parse(
        &json!({
            "profile_name": "Example Pack",
            "profile_id": "0123456789abcdef0123456789abcdef",
            "profile_icon": "Furnace",
            "version_label": "1.12.2-forge1.12.2-14.23.5.2847",
            "game_versions": ["1.12.2", "1.12.1"],
            "release_preference": "release",
            "client": {
                "java_args": "-XX:+UseG1GC",
                "external_resources": { "overwrite": ["config/**"] },
                "curseforge_mods": mods
            }
        })
        .to_string(),
    )
    .unwrap()
}

async fn mount_registry(server: &MockServer, expected_lookups: u64) {
    Mock::given(method("GET"))
        .and(path("/api/examplemod"))
        .respond_with(ResponseTemplate::new(200).set_body_json(registry_payload()))
        .expect(expected_lookups)
        .mount(server)
        .await;
}

async fn mount_download(server: &MockServer, expected_downloads: u64) {
    Mock::given(method("GET"))
        .and(path("/files/2803/400/example-1.0.jar"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(JAR_BYTES))
        .expect(expected_downloads)
        .mount(server)
        .await;
}

fn builder(server: &MockServer, minecraft_dir: &Path, package_root: &Path, mods: &[&str]) -> ModpackBuilder {
    let client = build_http_client().unwrap();
    let registry = HttpRegistryClient::new(client.clone())
        .with_api_base(format!("{}/api", server.uri()))
        .with_download_base(format!("{}/files", server.uri()));

    ModpackBuilder::new(manifest(mods), minecraft_dir, Arc::new(registry), client)
        .with_package_root(package_root)
        .with_settings(Settings {
            client_memory_gb: Some(4.0),
            ..Default::default()
        })
}

fn package_with_config() -> tempfile::TempDir {
    let package = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(package.path().join("config/example")).unwrap();
    std::fs::write(package.path().join("config/example/example.cfg"), "enabled=true").unwrap();
    package
}

#[tokio::test]
async fn install_resolves_downloads_and_registers_profile() {
    let server = MockServer::start().await;
    mount_registry(&server, 1).await;
    mount_download(&server, 1).await;

    let minecraft = tempfile::tempdir().unwrap();
    let package = package_with_config();
    let builder = builder(&server, minecraft.path(), package.path(), &["examplemod"]);

    let report = builder.run(Mode::Install, &RunContext::new()).await.unwrap();

    assert!(report.is_success(), "failures: {:?}", report.failures);
    assert_eq!(report.downloaded, vec!["examplemod".to_string()]);

    let jar = builder.mods_dir().join("example-1.0.jar");
    assert_eq!(std::fs::read(&jar).unwrap(), JAR_BYTES);
    assert!(builder.config_dir().join("example/example.cfg").exists());

    let cache = ModListCache::load(builder.modlist_path()).await.unwrap();
    let entry = cache.get("examplemod").unwrap();
    assert_eq!(entry.file_id, Some(2803400));
    assert_eq!(entry.project_id, Some(123456));
    assert_eq!(
        entry.file_url,
        format!("{}/files/2803/400/example-1.0.jar", server.uri())
    );

    assert_eq!(
        builder.profile_dir(),
        minecraft.path().join("profiles/0123456789abcdef0123456789abcdef")
    );
    let launcher_id = builder.launcher_profile_id().await.unwrap().unwrap();
    let profiles = ProfileManager::new(minecraft.path()).load().await.unwrap();
    let profile = profiles.profile(&launcher_id).unwrap();
    assert_eq!(profile.name.as_deref(), Some("Example Pack"));
    assert_eq!(profile.java_args.as_deref(), Some("-Xmx4096M -XX:+UseG1GC"));
    assert_eq!(
        profile.last_version_id.as_deref(),
        Some("1.12.2-forge1.12.2-14.23.5.2847")
    );
    assert_eq!(profiles.selected_profile(), Some(launcher_id.as_str()));
}

#[tokio::test]
async fn second_install_uses_cache_and_existing_files() {
    let server = MockServer::start().await;
    mount_registry(&server, 1).await;
    mount_download(&server, 1).await;

    let minecraft = tempfile::tempdir().unwrap();
    let package = package_with_config();
    let builder = builder(&server, minecraft.path(), package.path(), &["examplemod"]);

    builder.run(Mode::Install, &RunContext::new()).await.unwrap();
    let report = builder.run(Mode::Install, &RunContext::new()).await.unwrap();

    assert!(report.is_success());
    assert!(report.downloaded.is_empty());
    assert!(report.installed.is_empty());
    assert!(builder.mods_dir().join("example-1.0.jar").exists());
}

#[tokio::test]
async fn missing_mod_is_reported_without_stopping_the_run() {
    let server = MockServer::start().await;
    mount_registry(&server, 1).await;
    mount_download(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/ghostmod"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let minecraft = tempfile::tempdir().unwrap();
    let package = package_with_config();
    let builder = builder(
        &server,
        minecraft.path(),
        package.path(),
        &["examplemod", "ghostmod"],
    );

    let report = builder.run(Mode::Install, &RunContext::new()).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].identifier, "ghostmod");
    assert!(builder.mods_dir().join("example-1.0.jar").exists());

    let cache = ModListCache::load(builder.modlist_path()).await.unwrap();
    assert!(cache.contains("examplemod"));
    assert!(!cache.contains("ghostmod"));
}

#[tokio::test]
async fn failed_download_leaves_no_partial_file() {
    let server = MockServer::start().await;
    mount_registry(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/files/2803/400/example-1.0.jar"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let minecraft = tempfile::tempdir().unwrap();
    let package = package_with_config();
    let builder = builder(&server, minecraft.path(), package.path(), &["examplemod"]);

    let report = builder.run(Mode::Install, &RunContext::new()).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(!builder.mods_dir().join("example-1.0.jar").exists());
    assert!(!builder.profile_dir().join(".downloads").exists());
}

#[tokio::test]
async fn update_removes_mods_dropped_from_the_manifest() {
    let server = MockServer::start().await;
    mount_registry(&server, 1).await;
    mount_download(&server, 1).await;

    let minecraft = tempfile::tempdir().unwrap();
    let package = package_with_config();
    let builder = builder(&server, minecraft.path(), package.path(), &["examplemod"]);

    builder.run(Mode::Install, &RunContext::new()).await.unwrap();
    let stale = builder.mods_dir().join("removed-mod-1.0.jar");
    std::fs::write(&stale, "old").unwrap();
    std::fs::write(
        builder.config_dir().join("example/example.cfg"),
        "enabled=false",
    )
    .unwrap();

    let report = builder.run(Mode::Update, &RunContext::new()).await.unwrap();

    assert!(report.is_success());
    assert!(!stale.exists());
    assert!(builder.mods_dir().join("example-1.0.jar").exists());
    assert_eq!(
        std::fs::read_to_string(builder.config_dir().join("example/example.cfg")).unwrap(),
        "enabled=true"
    );
}

#[tokio::test]
async fn uninstall_removes_profile_and_files() {
    let server = MockServer::start().await;
    mount_registry(&server, 1).await;
    mount_download(&server, 1).await;

    let minecraft = tempfile::tempdir().unwrap();
    let package = package_with_config();
    let builder = builder(&server, minecraft.path(), package.path(), &["examplemod"]);

    builder.run(Mode::Install, &RunContext::new()).await.unwrap();
    let launcher_id = builder.launcher_profile_id().await.unwrap().unwrap();
    let report = builder.run(Mode::Uninstall, &RunContext::new()).await.unwrap();

    assert!(report.is_success());
    assert!(!builder.profile_dir().exists());
    let profiles = ProfileManager::new(minecraft.path()).load().await.unwrap();
    assert!(!profiles.contains(&launcher_id));
}
