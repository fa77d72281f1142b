//! Forge installation through the external installer wrapper.
//!
//! The wrapper drives Forge's own installer headlessly. It always writes the
//! profile registry at the shared data root, so the per-install registry is
//! swapped in before the run and copied back afterwards.

pub mod installer;

use crate::game::installer::config::Endpoints;
use crate::game::installer::core::downloader::ContentStore;
use crate::game::installer::core::library::{install_library, ExistingJar};
use crate::game::installer::core::traits::{PatchInstaller, PatchInvocation};
use crate::game::installer::profiles::{seed_profiles, LauncherProfiles};
use crate::game::installer::types::{Flow, InstallLayout, ProgressReporter};
use crate::game::launcher::rules::Environment;
use crate::game::launcher::version_parser::parse_version_file;
use crate::utils::version::release_major_minor;
use crate::LauncherError;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Which installer wrapper handles a Minecraft version: 2 for 1.13+
pub fn wrapper_generation(minecraft_version: &str) -> u8 {
    match release_major_minor(minecraft_version) {
        Some((major, minor)) if major > 1 || minor > 12 => 2,
        Some(_) => 1,
        // snapshots and unknown ids postdate the old installer format
        None => 2,
    }
}

pub fn wrapper_entry_point(generation: u8) -> String {
    format!("moe.z0ne.mc.forge{}installer.MainKt", generation)
}

/// Inputs for one Forge installation
pub struct ForgeRequest<'a> {
    pub minecraft_version: &'a str,
    pub forge_version: &'a str,
    pub java: PathBuf,
}

/// Result of a Forge installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForgeOutcome {
    Installed { version_id: String, repaired: usize },
    Cancelled,
}

/// Download the wrapper and installer, run the installer, reconcile the
/// profile registries and fill in libraries the installer failed to fetch.
pub async fn install_forge(
    store: &ContentStore,
    endpoints: &Endpoints,
    layout: &InstallLayout,
    env: &Environment,
    request: &ForgeRequest<'_>,
    patcher: &dyn PatchInstaller,
    reporter: &dyn ProgressReporter,
) -> Result<ForgeOutcome> {
    log::info!(
        "Installing Forge {} for Minecraft {}",
        request.forge_version,
        request.minecraft_version
    );

    let generation = wrapper_generation(request.minecraft_version);
    reporter.set_message("Downloading Forge installer");
    let wrapper_jar = download_wrapper(store, endpoints, &layout.cache_dir, generation).await?;
    let installer_jar = download_installer(store, endpoints, &layout.cache_dir, request.forge_version).await?;

    if reporter.is_cancelled() {
        return Ok(ForgeOutcome::Cancelled);
    }

    reporter.set_message("Running Forge installer");
    let local = layout.local_profiles();
    let global = layout.global_profiles();
    seed_profiles(&local).await?;
    swap_in_profiles(&local, &global).await?;

    let invocation = PatchInvocation {
        java: request.java.clone(),
        wrapper_jar,
        installer_jar,
        entry_point: wrapper_entry_point(generation),
        root: layout.data_root.clone(),
        classpath_separator: env.os.classpath_separator().to_string(),
    };
    log::info!("Running Forge installer: {:?} {:?}", invocation.java, invocation.args());
    let code = patcher.run(&invocation).await?;

    copy_file(&global, &local)
        .await
        .context("Failed to copy profile registry back from the shared root")?;

    if code != Some(0) {
        let status = code.map_or_else(|| "a signal".to_string(), |c| format!("code {}", c));
        return Err(LauncherError::Patch { status }.into());
    }

    let profiles = LauncherProfiles::load(&local).await?;
    let version_id = profiles
        .forge_version_id()
        .ok_or_else(|| LauncherError::missing("launcher_profiles.json", "profiles.forge"))?
        .to_string();
    log::info!("Forge installed as version {}", version_id);

    reporter.set_message("Verifying Forge libraries");
    match repair_libraries(store, endpoints, layout, env, &version_id, reporter).await? {
        (Flow::Completed, repaired) => Ok(ForgeOutcome::Installed {
            version_id,
            repaired,
        }),
        (Flow::Cancelled, _) => Ok(ForgeOutcome::Cancelled),
    }
}

async fn download_wrapper(
    store: &ContentStore,
    endpoints: &Endpoints,
    cache_dir: &Path,
    generation: u8,
) -> Result<PathBuf> {
    let url = endpoints.forge_wrapper_url(generation);
    let checksum = store
        .fetch_text(&format!("{}.sha1sum", url))
        .await
        .context("Failed to fetch installer wrapper checksum")?;
    let sha1 = checksum
        .split_whitespace()
        .next()
        .ok_or_else(|| LauncherError::missing(format!("{}.sha1sum", url), "sha1"))?;

    let path = cache_dir.join(format!("forge{}.jar", generation));
    store.download(&url, &path, Some(sha1)).await?;
    Ok(path)
}

async fn download_installer(
    store: &ContentStore,
    endpoints: &Endpoints,
    cache_dir: &Path,
    forge_version: &str,
) -> Result<PathBuf> {
    let path = cache_dir.join(format!("forge-{}-installer.jar", forge_version));
    if path.exists() {
        log::debug!("Forge installer already cached at {:?}", path);
        return Ok(path);
    }
    let url = endpoints.forge_installer_url(forge_version);
    store.download(&url, &path, None).await?;
    Ok(path)
}

/// Replace the shared registry with this install's registry
async fn swap_in_profiles(local: &Path, global: &Path) -> Result<()> {
    match tokio::fs::remove_file(global).await {
        Ok(()) => log::debug!("Removed shared profile registry {:?}", global),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("Failed to remove {:?}", global)),
    }
    copy_file(local, global).await
}

async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(from, to)
        .await
        .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
    Ok(())
}

/// Download every allowed library of `version_id` that is missing on disk
/// and extract the natives it declares
pub async fn repair_libraries(
    store: &ContentStore,
    endpoints: &Endpoints,
    layout: &InstallLayout,
    env: &Environment,
    version_id: &str,
    reporter: &dyn ProgressReporter,
) -> Result<(Flow, usize)> {
    let manifest = parse_version_file(&layout.version_json(version_id))
        .with_context(|| format!("Forge installer did not produce version {}", version_id))?;

    let libraries: Vec<_> = manifest
        .libraries
        .iter()
        .filter(|lib| !lib.is_placeholder() && lib.is_allowed(env))
        .collect();
    let total = libraries.len() as u32;
    let mut repaired = 0;

    for (i, lib) in libraries.into_iter().enumerate() {
        if reporter.is_cancelled() {
            return Ok((Flow::Cancelled, repaired));
        }
        reporter.set_substep(Some(&lib.name), Some(i as u32 + 1), Some(total));

        let fetched = install_library(
            store,
            &endpoints.libraries,
            layout,
            &env.os,
            lib,
            ExistingJar::Keep,
        )
        .await?;
        if fetched > 0 {
            log::info!("Library {} was missing after Forge install, fetched {} file(s)", lib.name, fetched);
            repaired += 1;
        }
        tokio::task::yield_now().await;
    }

    Ok((Flow::Completed, repaired))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_for_version() {
        assert_eq!(wrapper_generation("1.12.2"), 1);
        assert_eq!(wrapper_generation("1.7.10"), 1);
        assert_eq!(wrapper_generation("1.13"), 2);
        assert_eq!(wrapper_generation("1.16.5"), 2);
        assert_eq!(wrapper_entry_point(1), "moe.z0ne.mc.forge1installer.MainKt");
    }

    #[test]
    fn invocation_arguments() {
        let inv = PatchInvocation {
            java: PathBuf::from("java"),
            wrapper_jar: PathBuf::from("/c/forge2.jar"),
            installer_jar: PathBuf::from("/c/forge-installer.jar"),
            entry_point: wrapper_entry_point(2),
            root: PathBuf::from("/data"),
            classpath_separator: ":".into(),
        };
        assert_eq!(
            inv.args(),
            vec![
                "-cp",
                "/c/forge2.jar:/c/forge-installer.jar",
                "moe.z0ne.mc.forge2installer.MainKt",
                "/data"
            ]
        );
    }

    #[tokio::test]
    async fn swap_replaces_shared_registry() {
        let tmp = tempfile::tempdir().unwrap();
        let local = tmp.path().join("pack/launcher_profiles.json");
        let global = tmp.path().join("launcher_profiles.json");
        std::fs::create_dir_all(local.parent().unwrap()).unwrap();
        std::fs::write(&local, "local").unwrap();
        std::fs::write(&global, "someone else's").unwrap();

        swap_in_profiles(&local, &global).await.unwrap();
        assert_eq!(std::fs::read_to_string(&global).unwrap(), "local");
    }
}
