pub mod config;
pub mod core;
pub mod modloaders;
pub mod profiles;
pub mod types;


use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use crate::auth::Account;
use crate::config::Settings;
use crate::game::installer::config::Endpoints;
use crate::game::installer::core::downloader::ContentStore;
use crate::game::installer::core::library::{install_library, ExistingJar};
use crate::game::installer::core::traits::PatchInstaller;
use crate::game::installer::modloaders::{install_forge, ForgeOutcome, ForgeRequest, JavaPatchInstaller};
use crate::game::installer::profiles::{seed_profiles, LauncherProfiles};
use crate::game::launcher::arguments::{build_arguments, build_launch_command, LaunchCommand, LaunchContext};
use crate::game::launcher::process::find_java;
use crate::game::launcher::resolver::VersionResolver;
use crate::game::launcher::rules::Environment;
use crate::game::launcher::version_parser::{
    parse_version_file, AssetObjects, VersionList, VersionListEntry, VersionManifest,
};
use crate::game::modpack::{
    fetch_modpack, install_serversync, load_cached_modpack, save_cached_modpack, sync_packages,
    ModpackManifest, SERVERSYNC_DEFAULT_PORT,
};
use crate::LauncherError;
use types::{read_marker, write_marker, Flow, InstallLayout, InstallStage, ProgressReporter};

/// Launch gates observed by the UI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateState {
    pub can_launch: bool,
    pub update_available: bool,
}

/// Result of [`Updater::check`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    UpToDate { version: String },
    UpdateAvailable {
        installed: Option<String>,
        available: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Completed,
    Cancelled,
}

impl UpdateOutcome {
    /// For callers that treat an interrupted run as a failure
    pub fn into_result(self) -> Result<()> {
        match self {
            UpdateOutcome::Completed => Ok(()),
            UpdateOutcome::Cancelled => Err(LauncherError::Cancelled.into()),
        }
    }
}

/// Values carried from one stage to the next within a run
#[derive(Default)]
struct RunState {
    entry: Option<VersionListEntry>,
    manifest: Option<VersionManifest>,
}

/// Brings an install root up to the state its modpack manifest pins.
///
/// Not meant for overlapping runs against the same install root; callers
/// gate `update()` on [`UpdateState`].
pub struct Updater {
    store: ContentStore,
    endpoints: Endpoints,
    layout: InstallLayout,
    environment: Environment,
    java: PathBuf,
    definition: String,
    patcher: Arc<dyn PatchInstaller>,
    modpack: Option<ModpackManifest>,
    state: watch::Sender<UpdateState>,
}

impl Updater {
    /// `definition` is the URL of the modpack manifest
    pub fn new(
        layout: InstallLayout,
        definition: impl Into<String>,
        environment: Environment,
    ) -> Result<Self> {
        let (state, _) = watch::channel(UpdateState::default());
        Ok(Self {
            store: ContentStore::new()?,
            endpoints: Endpoints::default(),
            layout,
            environment,
            java: find_java(None),
            definition: definition.into(),
            patcher: Arc::new(JavaPatchInstaller),
            modpack: None,
            state,
        })
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_store(mut self, store: ContentStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_patcher(mut self, patcher: Arc<dyn PatchInstaller>) -> Self {
        self.patcher = patcher;
        self
    }

    /// Java executable used for the Forge installer
    pub fn with_java(mut self, java: impl Into<PathBuf>) -> Self {
        self.java = java.into();
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn modpack(&self) -> Option<&ModpackManifest> {
        self.modpack.as_ref()
    }

    pub fn state(&self) -> UpdateState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.state.subscribe()
    }

    fn publish(&self, can_launch: bool, update_available: bool) {
        self.state.send_replace(UpdateState {
            can_launch,
            update_available,
        });
    }

    /// Fetch the modpack manifest and compare it with the installed marker
    pub async fn check(&mut self) -> Result<CheckOutcome> {
        let modpack = fetch_modpack(&self.store, &self.definition).await?;
        save_cached_modpack(&self.layout.modpack_cache(), &modpack).await?;

        let installed = read_marker(&self.layout.version_marker()).await?;
        let outcome = if installed.as_deref() == Some(modpack.version.as_str()) {
            log::info!("Modpack is up to date at version {}", modpack.version);
            self.publish(true, false);
            CheckOutcome::UpToDate {
                version: modpack.version.clone(),
            }
        } else {
            log::info!(
                "Modpack update available: {:?} -> {}",
                installed,
                modpack.version
            );
            self.publish(false, true);
            CheckOutcome::UpdateAvailable {
                installed,
                available: modpack.version.clone(),
            }
        };

        self.modpack = Some(modpack);
        Ok(outcome)
    }

    /// Use the manifest cached by a previous `check()`, for offline starts
    pub async fn load_cached(&mut self) -> Result<bool> {
        let Some(modpack) = load_cached_modpack(&self.layout.modpack_cache()).await? else {
            return Ok(false);
        };
        let installed = read_marker(&self.layout.version_marker()).await?;
        let current = installed.as_deref() == Some(modpack.version.as_str());
        self.publish(current, !current);
        self.modpack = Some(modpack);
        Ok(true)
    }

    /// Run every install stage in order
    pub async fn update(&mut self, reporter: &dyn ProgressReporter) -> Result<UpdateOutcome> {
        let modpack = self
            .modpack
            .clone()
            .ok_or_else(|| anyhow!("No modpack manifest loaded, run check() first"))?;
        log::info!(
            "Updating {:?} to modpack {} (minecraft {}, forge {:?})",
            self.layout.install_root,
            modpack.version,
            modpack.minecraft,
            modpack.forge
        );
        self.publish(false, self.state().update_available);

        let mut run = RunState::default();
        for stage in InstallStage::ALL {
            if reporter.is_cancelled() {
                return Ok(self.cancelled(stage, reporter));
            }

            reporter.start_step(stage);
            reporter.set_message(stage.message());
            log::info!("[{}] {}", stage, stage.message());

            let flow = match self
                .run_stage(stage, &modpack, &mut run, reporter)
                .await
                .with_context(|| format!("{} failed", stage))
            {
                Ok(flow) => flow,
                Err(e) => {
                    log::error!("[{}] {:#}", stage, e);
                    reporter.done(false, Some(&format!("{:#}", e)));
                    return Err(e);
                }
            };

            if flow == Flow::Cancelled {
                return Ok(self.cancelled(stage, reporter));
            }
        }

        reporter.done(true, Some(InstallStage::Done.message()));
        Ok(UpdateOutcome::Completed)
    }

    fn cancelled(&self, stage: InstallStage, reporter: &dyn ProgressReporter) -> UpdateOutcome {
        log::warn!("Update cancelled during {}", stage);
        reporter.done(false, Some("Update cancelled"));
        UpdateOutcome::Cancelled
    }

    async fn run_stage(
        &self,
        stage: InstallStage,
        modpack: &ModpackManifest,
        run: &mut RunState,
        reporter: &dyn ProgressReporter,
    ) -> Result<Flow> {
        match stage {
            InstallStage::Prepare => self.prepare(&modpack.minecraft, run).await,
            InstallStage::DownloadEngine => self.download_engine(&modpack.minecraft, run).await,
            InstallStage::DownloadLibraries => {
                let manifest = run
                    .manifest
                    .as_ref()
                    .ok_or_else(|| anyhow!("Engine manifest not loaded"))?;
                self.download_libraries(manifest, reporter).await
            }
            InstallStage::DownloadAssets => {
                let manifest = run
                    .manifest
                    .as_ref()
                    .ok_or_else(|| anyhow!("Engine manifest not loaded"))?;
                self.download_assets(manifest, reporter).await
            }
            InstallStage::DownloadPatch => self.download_patch(modpack, reporter).await,
            InstallStage::SyncPackages => self.sync(modpack, reporter).await,
            InstallStage::Done => {
                write_marker(&self.layout.version_marker(), &modpack.version).await?;
                log::info!("Installed modpack version {}", modpack.version);
                self.publish(true, false);
                Ok(Flow::Completed)
            }
        }
    }

    async fn prepare(&self, version_id: &str, run: &mut RunState) -> Result<Flow> {
        let json = self.layout.version_json(version_id);
        if json.exists() {
            log::debug!("Version {} already present at {:?}", version_id, json);
            return Ok(Flow::Completed);
        }

        let list: VersionList = self.store.fetch_json(&self.endpoints.version_manifest).await?;
        let entry = list
            .find(version_id)
            .ok_or_else(|| LauncherError::VersionNotFound(version_id.to_string()))?;
        log::info!("Resolved {} ({}) at {}", entry.id, entry.version_type, entry.url);
        run.entry = Some(entry.clone());
        Ok(Flow::Completed)
    }

    async fn download_engine(&self, version_id: &str, run: &mut RunState) -> Result<Flow> {
        let json = self.layout.version_json(version_id);
        if let Some(entry) = &run.entry {
            self.store
                .download(&entry.url, &json, entry.sha1.as_deref())
                .await?;
        }
        let manifest = parse_version_file(&json)?;

        let client = manifest.client_download()?;
        self.store
            .download(
                &client.url,
                &self.layout.version_jar(version_id),
                client.sha1.as_deref(),
            )
            .await?;

        if seed_profiles(&self.layout.local_profiles()).await? {
            log::info!("Created profile registry for {:?}", self.layout.install_root);
        }

        run.manifest = Some(manifest);
        Ok(Flow::Completed)
    }

    async fn download_libraries(
        &self,
        manifest: &VersionManifest,
        reporter: &dyn ProgressReporter,
    ) -> Result<Flow> {
        let env = &self.environment;
        let libraries: Vec<_> = manifest
            .libraries
            .iter()
            .filter(|lib| lib.is_allowed(env) && !lib.is_placeholder())
            .collect();
        let total = libraries.len() as u32;

        for (i, lib) in libraries.into_iter().enumerate() {
            if reporter.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            reporter.set_substep(Some(&lib.name), Some(i as u32 + 1), Some(total));

            install_library(
                &self.store,
                &self.endpoints.libraries,
                &self.layout,
                &env.os,
                lib,
                ExistingJar::Verify,
            )
            .await?;
            tokio::task::yield_now().await;
        }

        Ok(Flow::Completed)
    }

    async fn download_assets(
        &self,
        manifest: &VersionManifest,
        reporter: &dyn ProgressReporter,
    ) -> Result<Flow> {
        let index = manifest
            .asset_index
            .as_ref()
            .ok_or_else(|| LauncherError::missing(format!("version {}", manifest.id), "assetIndex"))?;
        let index_id = manifest
            .assets
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(&index.id);
        let index_path = self.layout.asset_index_path(index_id);

        self.store
            .download(&index.url, &index_path, Some(index.sha1.as_str()))
            .await?;
        let content = tokio::fs::read_to_string(&index_path)
            .await
            .with_context(|| format!("Failed to read asset index {:?}", index_path))?;
        let objects: AssetObjects = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse asset index {:?}", index_path))?;

        let total = objects.objects.len() as u32;
        let objects_dir = self.layout.asset_objects_dir();
        log::info!("Verifying {} asset objects", total);

        for (i, (name, object)) in objects.objects.iter().enumerate() {
            if reporter.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            reporter.set_substep(Some(name), Some(i as u32 + 1), Some(total));

            let relative = object.path();
            self.store
                .download(
                    &self.endpoints.asset_url(&relative),
                    &objects_dir.join(&relative),
                    Some(object.hash.as_str()),
                )
                .await?;
            tokio::task::yield_now().await;
        }

        Ok(Flow::Completed)
    }

    async fn download_patch(
        &self,
        modpack: &ModpackManifest,
        reporter: &dyn ProgressReporter,
    ) -> Result<Flow> {
        let Some(forge) = modpack.forge.as_deref() else {
            log::debug!("No Forge version pinned");
            return Ok(Flow::Completed);
        };

        let marker = self.layout.patch_marker();
        if read_marker(&marker).await?.as_deref() == Some(forge) {
            log::info!("Forge {} already installed", forge);
            return Ok(Flow::Completed);
        }

        let request = ForgeRequest {
            minecraft_version: &modpack.minecraft,
            forge_version: forge,
            java: self.java.clone(),
        };
        let outcome = install_forge(
            &self.store,
            &self.endpoints,
            &self.layout,
            &self.environment,
            &request,
            self.patcher.as_ref(),
            reporter,
        )
        .await?;

        match outcome {
            ForgeOutcome::Installed {
                version_id,
                repaired,
            } => {
                if repaired > 0 {
                    log::warn!("Fetched {} libraries the Forge installer left out", repaired);
                }
                write_marker(&marker, forge).await?;
                log::info!("Forge {} installed as {}", forge, version_id);
                Ok(Flow::Completed)
            }
            ForgeOutcome::Cancelled => Ok(Flow::Cancelled),
        }
    }

    async fn sync(&self, modpack: &ModpackManifest, reporter: &dyn ProgressReporter) -> Result<Flow> {
        let root = &self.layout.install_root;
        if sync_packages(&self.store, root, &modpack.packages, reporter).await? == Flow::Cancelled {
            return Ok(Flow::Cancelled);
        }

        if let Some(address) = modpack.serversync.as_deref() {
            reporter.set_message("Configuring ServerSync");
            let port = modpack.serversync_port.unwrap_or(SERVERSYNC_DEFAULT_PORT);
            install_serversync(&self.store, &self.endpoints, root, address, port).await?;
        }

        Ok(Flow::Completed)
    }

    /// Version id to launch: the Forge profile's version when Forge is
    /// pinned, else the engine version
    pub async fn launch_version_id(&self) -> Result<String> {
        let modpack = self
            .modpack
            .as_ref()
            .ok_or_else(|| anyhow!("No modpack manifest loaded"))?;
        if modpack.forge.is_none() {
            return Ok(modpack.minecraft.clone());
        }
        let profiles = LauncherProfiles::load(&self.layout.local_profiles()).await?;
        profiles
            .forge_version_id()
            .map(str::to_string)
            .ok_or_else(|| LauncherError::missing("launcher_profiles.json", "profiles.forge").into())
    }

    /// Resolve the installed version and build the full game command line
    pub async fn launch_command(
        &self,
        account: &Account,
        settings: &Settings,
        launcher_name: &str,
    ) -> Result<LaunchCommand> {
        if !self.state().can_launch {
            return Err(anyhow!("Modpack is not installed or out of date"));
        }
        let version_id = self.launch_version_id().await?;
        let mut resolver = VersionResolver::new(self.layout.versions_dir());
        let effective = resolver.resolve(&version_id)?;

        let ctx = LaunchContext {
            layout: self.layout.clone(),
            account: account.clone(),
            width: settings.minecraft.width,
            height: settings.minecraft.height,
            launcher_name: launcher_name.to_string(),
            launcher_version: self
                .modpack
                .as_ref()
                .map(|m| m.version.clone())
                .unwrap_or_default(),
            environment: self.environment.clone(),
        };
        let tokens = build_arguments(&effective, &ctx)?;
        build_launch_command(settings, tokens, &ctx)
    }
}
