use crate::game::installer::core::archive::extract_archive;
use crate::game::installer::core::downloader::ContentStore;
use crate::game::installer::types::InstallLayout;
use crate::game::launcher::rules::OsDescriptor;
use crate::game::launcher::version_parser::Library;
use anyhow::{Context, Result};

/// How to treat a main jar that is already on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingJar {
    /// Re-hash it and re-fetch on mismatch
    Verify,
    /// Leave it alone
    Keep,
}

/// Fetch a library's main jar and its native archive for `os`, extracting
/// the natives into the shared natives directory.
///
/// Natives-only libraries have no main jar to fetch. Returns the number of
/// files actually downloaded.
pub async fn install_library(
    store: &ContentStore,
    repository: &str,
    layout: &InstallLayout,
    os: &OsDescriptor,
    lib: &Library,
    existing: ExistingJar,
) -> Result<usize> {
    let libraries_dir = layout.libraries_dir();
    let mut fetched = 0;

    if lib.has_primary_artifact() {
        let path = libraries_dir.join(lib.path()?);
        if existing == ExistingJar::Keep && path.exists() {
            log::debug!("Library {} already present at {:?}", lib.name, path);
        } else {
            let url = lib.remote_url(repository)?;
            let sha1 = lib.artifact().and_then(|a| a.sha1.as_deref());
            if store.download(&url, &path, sha1).await? {
                fetched += 1;
            }
        }
    }

    if let Some(classifier) = lib.native_classifier(os) {
        let url = lib.native_url(&classifier, repository)?;
        let path = libraries_dir.join(lib.native_path(&classifier)?);
        let sha1 = lib.native_artifact(&classifier).and_then(|a| a.sha1.as_deref());
        if store.download(&url, &path, sha1).await? {
            fetched += 1;
        }

        let dest = layout.natives_dir();
        let excludes = lib.extract_excludes().to_vec();
        let count = tokio::task::spawn_blocking(move || extract_archive(&path, &dest, &excludes))
            .await
            .context("Native extraction task panicked")??;
        log::debug!("Extracted {} native files from {}", count, lib.name);
    }

    Ok(fetched)
}
