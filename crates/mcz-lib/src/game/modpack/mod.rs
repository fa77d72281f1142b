//! Modpack manifest retrieval and package synchronisation.

pub mod types;

pub use types::*;

use crate::game::installer::config::Endpoints;
use crate::game::installer::core::archive::extract_archive;
use crate::game::installer::core::downloader::ContentStore;
use crate::game::installer::types::{Flow, ProgressReporter};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const SERVERSYNC_TEMPLATE: &str = include_str!("../../../resources/serversync-client.cfg");
pub const SERVERSYNC_DEFAULT_PORT: u16 = 38067;

/// Fetch the modpack definition from an http(s) or file URL
pub async fn fetch_modpack(store: &ContentStore, url: &str) -> Result<ModpackManifest> {
    log::info!("Fetching modpack manifest from {}", url);
    store
        .fetch_json(url)
        .await
        .with_context(|| format!("Failed to load modpack manifest from {}", url))
}

/// Last manifest written by [`save_cached_modpack`], if any
pub async fn load_cached_modpack(path: &Path) -> Result<Option<ModpackManifest>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(
            serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to parse cached modpack {:?}", path))?,
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read cached modpack {:?}", path)),
    }
}

pub async fn save_cached_modpack(path: &Path, manifest: &ModpackManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(manifest)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {:?}", path))
}

/// Apply every package in manifest order, checking for cancellation
/// between packages
pub async fn sync_packages(
    store: &ContentStore,
    root: &Path,
    packages: &[Package],
    reporter: &dyn ProgressReporter,
) -> Result<Flow> {
    let total = packages.len() as u32;
    for (i, package) in packages.iter().enumerate() {
        if reporter.is_cancelled() {
            log::warn!("Package sync cancelled before {}", package.id);
            return Ok(Flow::Cancelled);
        }
        reporter.set_substep(Some(&package.id), Some(i as u32 + 1), Some(total));

        apply_package(store, root, package)
            .await
            .with_context(|| format!("Failed to {} package {}", package.action, package.id))?;

        tokio::task::yield_now().await;
    }
    Ok(Flow::Completed)
}

/// Apply a single package action below `root`
pub async fn apply_package(store: &ContentStore, root: &Path, package: &Package) -> Result<()> {
    let path = package.file_path(root);

    match package.action {
        Action::Ignore => {
            log::debug!("Ignoring package {}", package.id);
        }
        Action::Remove => {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => log::info!("Removed package {} ({:?})", package.id, path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    log::debug!("Package {} already absent at {:?}", package.id, path)
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove {:?}", path));
                }
            }
        }
        Action::Download | Action::Extract => {
            let url = match &package.url {
                Some(url) => url,
                None => {
                    log::debug!("Package {} has no url, nothing to fetch", package.id);
                    return Ok(());
                }
            };

            store.download(url, &path, package.sha1.as_deref()).await?;

            if package.action == Action::Extract {
                let dest = package.target_dir(root);
                let archive = path.clone();
                let count = tokio::task::spawn_blocking(move || extract_archive(&archive, &dest, &[]))
                    .await
                    .context("Extraction task panicked")??;
                log::info!("Extracted {} files from package {}", count, package.id);
            }
        }
    }

    Ok(())
}

/// Fill the bundled ServerSync client config template
pub fn render_serversync_config(address: &str, port: u16) -> String {
    SERVERSYNC_TEMPLATE
        .replace("{address}", address)
        .replace("{port}", &port.to_string())
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
}

pub fn serversync_jar_path(root: &Path) -> PathBuf {
    root.join("serversync.jar")
}

/// Make sure the ServerSync client jar is present and its config points at
/// `address:port`
pub async fn install_serversync(
    store: &ContentStore,
    endpoints: &Endpoints,
    root: &Path,
    address: &str,
    port: u16,
) -> Result<()> {
    let jar = serversync_jar_path(root);
    if !jar.exists() {
        log::info!("Fetching ServerSync release info from {}", endpoints.serversync_release);
        let release: GithubRelease = store.fetch_json(&endpoints.serversync_release).await?;
        let asset = release
            .assets
            .iter()
            .find(|a| a.name.ends_with(".jar"))
            .ok_or_else(|| crate::LauncherError::missing("ServerSync release", "assets[*.jar]"))?;
        store.download(&asset.browser_download_url, &jar, None).await?;
    }

    let dir = root.join("config").join("serversync");
    tokio::fs::create_dir_all(&dir).await?;
    let cfg = dir.join("serversync-client.cfg");
    tokio::fs::write(&cfg, render_serversync_config(address, port))
        .await
        .with_context(|| format!("Failed to write {:?}", cfg))?;
    log::info!("Wrote ServerSync config for {}:{}", address, port);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::installer::core::downloader::sha1_hex;
    use crate::game::installer::types::SilentProgressReporter;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            for (name, data) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(data).unwrap();
            }
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    fn pkg(id: &str, url: Option<String>, action: Action) -> Package {
        Package {
            id: id.into(),
            url,
            sha1: None,
            homepage: None,
            target: None,
            action,
        }
    }

    #[tokio::test]
    async fn remove_without_url() {
        let tmp = tempdir().unwrap();
        let store = ContentStore::new().unwrap();
        let placed = tmp.path().join("oldmod");
        std::fs::write(&placed, b"x").unwrap();

        let remove = pkg("oldmod", None, Action::Remove);
        apply_package(&store, tmp.path(), &remove).await.unwrap();
        assert!(!placed.exists());

        // already gone is fine
        apply_package(&store, tmp.path(), &remove).await.unwrap();
    }

    #[tokio::test]
    async fn ignore_keeps_file() {
        let tmp = tempdir().unwrap();
        let store = ContentStore::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("mods")).unwrap();
        let placed = tmp.path().join("mods/jei.jar");
        std::fs::write(&placed, b"x").unwrap();

        let ignore = pkg("jei", Some("http://127.0.0.1:9/jei.jar".into()), Action::Ignore);
        apply_package(&store, tmp.path(), &ignore).await.unwrap();
        assert!(placed.exists());
    }

    #[tokio::test]
    async fn download_and_extract() {
        let server = MockServer::start().await;
        let jar = b"mod jar".to_vec();
        let archive = zip_bytes(&[("config/jei.toml", b"a=1"), ("options.txt", b"fov:90")]);
        Mock::given(method("GET"))
            .and(path("/jei.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(jar.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/defaults.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
            .mount(&server)
            .await;

        let tmp = tempdir().unwrap();
        let store = ContentStore::new().unwrap();
        let mut download = pkg("jei", Some(format!("{}/jei.jar", server.uri())), Action::Download);
        download.sha1 = Some(sha1_hex(&jar));
        let extract = pkg("defaults", Some(format!("{}/defaults.zip", server.uri())), Action::Extract);

        let flow = sync_packages(&store, tmp.path(), &[download, extract], &SilentProgressReporter)
            .await
            .unwrap();

        assert_eq!(flow, Flow::Completed);
        assert_eq!(std::fs::read(tmp.path().join("mods/jei.jar")).unwrap(), jar);
        assert!(tmp.path().join("defaults.zip").exists());
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("config/jei.toml")).unwrap(),
            "a=1"
        );
        assert!(tmp.path().join("options.txt").exists());
    }

    struct CancelAfterFirst(AtomicBool);

    impl ProgressReporter for CancelAfterFirst {
        fn start_step(&self, _stage: crate::game::installer::types::InstallStage) {}
        fn set_message(&self, _message: &str) {}
        fn set_substep(&self, _name: Option<&str>, _current: Option<u32>, _total: Option<u32>) {
            self.0.store(true, Ordering::SeqCst);
        }
        fn done(&self, _success: bool, _message: Option<&str>) {}
        fn is_cancelled(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn cancellation_between_packages() {
        let tmp = tempdir().unwrap();
        let store = ContentStore::new().unwrap();
        std::fs::write(tmp.path().join("a"), b"x").unwrap();
        std::fs::write(tmp.path().join("b"), b"x").unwrap();
        let packages = vec![pkg("a", None, Action::Remove), pkg("b", None, Action::Remove)];

        let reporter = CancelAfterFirst(AtomicBool::new(false));
        let flow = sync_packages(&store, tmp.path(), &packages, &reporter)
            .await
            .unwrap();

        assert_eq!(flow, Flow::Cancelled);
        assert!(!tmp.path().join("a").exists());
        assert!(tmp.path().join("b").exists());
    }

    #[tokio::test]
    async fn serversync_config_is_rendered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/superzanti/ServerSync/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "assets": [
                    {"name": "serversync-4.1.0.tar", "browser_download_url": format!("{}/ss.tar", server.uri())},
                    {"name": "serversync-4.1.0.jar", "browser_download_url": format!("{}/ss.jar", server.uri())}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ss.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar".to_vec()))
            .mount(&server)
            .await;

        let tmp = tempdir().unwrap();
        let store = ContentStore::new().unwrap();
        let endpoints = Endpoints::with_base(&server.uri());
        install_serversync(&store, &endpoints, tmp.path(), "play.example.org", 38067)
            .await
            .unwrap();

        assert_eq!(std::fs::read(tmp.path().join("serversync.jar")).unwrap(), b"jar");
        let cfg = std::fs::read_to_string(tmp.path().join("config/serversync/serversync-client.cfg")).unwrap();
        assert!(cfg.contains("S:SERVER_IP=play.example.org"));
        assert!(cfg.contains("I:SERVER_PORT=38067"));
    }

    #[tokio::test]
    async fn cached_manifest_round_trip() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("modpack.json");
        assert!(load_cached_modpack(&path).await.unwrap().is_none());

        let manifest: ModpackManifest =
            serde_json::from_str(r#"{"minecraft": "1.16.5", "version": "3"}"#).unwrap();
        save_cached_modpack(&path, &manifest).await.unwrap();
        assert_eq!(load_cached_modpack(&path).await.unwrap(), Some(manifest));
    }
}
