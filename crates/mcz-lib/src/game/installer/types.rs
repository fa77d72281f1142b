use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, watch};

/// Ordered phases of an update run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallStage {
    Prepare,
    DownloadEngine,
    DownloadLibraries,
    DownloadAssets,
    DownloadPatch,
    SyncPackages,
    Done,
}

impl InstallStage {
    pub const ALL: [InstallStage; 7] = [
        InstallStage::Prepare,
        InstallStage::DownloadEngine,
        InstallStage::DownloadLibraries,
        InstallStage::DownloadAssets,
        InstallStage::DownloadPatch,
        InstallStage::SyncPackages,
        InstallStage::Done,
    ];

    /// Index of the last stage, used as the progress total
    pub const TOTAL: u32 = 6;

    pub fn index(&self) -> u32 {
        match self {
            InstallStage::Prepare => 0,
            InstallStage::DownloadEngine => 1,
            InstallStage::DownloadLibraries => 2,
            InstallStage::DownloadAssets => 3,
            InstallStage::DownloadPatch => 4,
            InstallStage::SyncPackages => 5,
            InstallStage::Done => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstallStage::Prepare => "PREPARE",
            InstallStage::DownloadEngine => "DOWNLOAD_ENGINE",
            InstallStage::DownloadLibraries => "DOWNLOAD_LIBRARIES",
            InstallStage::DownloadAssets => "DOWNLOAD_ASSETS",
            InstallStage::DownloadPatch => "DOWNLOAD_PATCH",
            InstallStage::SyncPackages => "SYNC_PACKAGES",
            InstallStage::Done => "DONE",
        }
    }

    /// Default status line shown when the stage starts
    pub fn message(&self) -> &'static str {
        match self {
            InstallStage::Prepare => "Preparing update",
            InstallStage::DownloadEngine => "Downloading Minecraft",
            InstallStage::DownloadLibraries => "Downloading libraries",
            InstallStage::DownloadAssets => "Downloading assets",
            InstallStage::DownloadPatch => "Installing Forge",
            InstallStage::SyncPackages => "Synchronizing modpack",
            InstallStage::Done => "Ready to play",
        }
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a cancellable unit of work ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Completed,
    Cancelled,
}

/// Progress reporter trait for installer operations
/// Implementations forward updates to the UI
pub trait ProgressReporter: Send + Sync {
    /// Enter a new stage
    fn start_step(&self, stage: InstallStage);

    /// Set a short status message
    fn set_message(&self, message: &str);

    /// Set a sub-step with optional name and progress (e.g. "lwjgl-3.2.2.jar (3/12)")
    fn set_substep(&self, name: Option<&str>, current: Option<u32>, total: Option<u32>);

    /// Mark operation as complete
    fn done(&self, success: bool, message: Option<&str>);

    /// Check if operation has been cancelled
    fn is_cancelled(&self) -> bool;
}

/// A progress reporter that does nothing (silent).
/// Useful for background verification or tests.
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn start_step(&self, _stage: InstallStage) {}
    fn set_message(&self, _message: &str) {}
    fn set_substep(&self, _name: Option<&str>, _current: Option<u32>, _total: Option<u32>) {}
    fn done(&self, _success: bool, _message: Option<&str>) {}
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Events published by [`ChannelProgressReporter`], in issue order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Stage {
        stage: InstallStage,
        current: u32,
        total: u32,
    },
    Message(String),
    Substep {
        name: Option<String>,
        current: Option<u32>,
        total: Option<u32>,
    },
    Finished {
        success: bool,
        message: Option<String>,
    },
}

/// Cancellation token wrapper
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Token plus the sender that trips it
    pub fn pair() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::new(rx))
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Reporter that forwards everything to an unbounded channel.
/// The receiving side may live on any thread.
pub struct ChannelProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    cancel: CancelToken,
}

impl ChannelProgressReporter {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>, cancel: CancelToken) -> Self {
        Self { tx, cancel }
    }

    /// Build a reporter with its event receiver and cancel switch
    pub fn channel() -> (
        Self,
        mpsc::UnboundedReceiver<ProgressEvent>,
        watch::Sender<bool>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel) = CancelToken::pair();
        (Self::new(tx, cancel), rx, cancel_tx)
    }

    fn send(&self, event: ProgressEvent) {
        // a dropped receiver only means nobody is watching
        let _ = self.tx.send(event);
    }
}

impl ProgressReporter for ChannelProgressReporter {
    fn start_step(&self, stage: InstallStage) {
        self.send(ProgressEvent::Stage {
            stage,
            current: stage.index(),
            total: InstallStage::TOTAL,
        });
    }

    fn set_message(&self, message: &str) {
        self.send(ProgressEvent::Message(message.to_string()));
    }

    fn set_substep(&self, name: Option<&str>, current: Option<u32>, total: Option<u32>) {
        self.send(ProgressEvent::Substep {
            name: name.map(str::to_string),
            current,
            total,
        });
    }

    fn done(&self, success: bool, message: Option<&str>) {
        self.send(ProgressEvent::Finished {
            success,
            message: message.map(str::to_string),
        });
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// On-disk layout shared by installer and launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    /// Shared root (versions, libraries, assets, global profile registry)
    pub data_root: PathBuf,

    /// Per-launcher root (markers, modpack content)
    pub install_root: PathBuf,

    /// Installer jars and other throwaway downloads
    pub cache_dir: PathBuf,
}

impl InstallLayout {
    /// Standard layout: `<data_root>/<launcher_id>` for the install root
    pub fn new(data_root: impl Into<PathBuf>, launcher_id: &str) -> Self {
        let data_root = data_root.into();
        Self {
            install_root: data_root.join(launcher_id),
            cache_dir: data_root.join("cache"),
            data_root,
        }
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.data_root.join("versions")
    }

    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id)
    }

    pub fn version_json(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{}.json", id))
    }

    pub fn version_jar(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{}.jar", id))
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.data_root.join("libraries")
    }

    pub fn natives_dir(&self) -> PathBuf {
        self.libraries_dir().join("natives")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_root.join("assets")
    }

    pub fn asset_index_path(&self, id: &str) -> PathBuf {
        self.assets_dir().join("indexes").join(format!("{}.json", id))
    }

    pub fn asset_objects_dir(&self) -> PathBuf {
        self.assets_dir().join("objects")
    }

    /// Marker holding the installed modpack version
    pub fn version_marker(&self) -> PathBuf {
        self.install_root.join("version")
    }

    /// Marker holding the installed Forge version
    pub fn patch_marker(&self) -> PathBuf {
        self.install_root.join("forgeVersion")
    }

    pub fn modpack_cache(&self) -> PathBuf {
        self.install_root.join("modpack.json")
    }

    /// Profile registry owned by this install
    pub fn local_profiles(&self) -> PathBuf {
        self.install_root.join("launcher_profiles.json")
    }

    /// Profile registry at the fixed location the Forge installer writes to
    pub fn global_profiles(&self) -> PathBuf {
        self.data_root.join("launcher_profiles.json")
    }
}

/// Read a one-line marker file; absent means `None`
pub async fn read_marker(path: &Path) -> anyhow::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => Ok(Some(s.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to read marker {:?}", path))),
    }
}

pub async fn write_marker(path: &Path, value: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, value)
        .await
        .map_err(|e| anyhow::Error::new(e).context(format!("Failed to write marker {:?}", path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = InstallLayout::new("/data", "pack");
        assert_eq!(layout.install_root, PathBuf::from("/data/pack"));
        assert_eq!(
            layout.version_json("1.16.5"),
            PathBuf::from("/data/versions/1.16.5/1.16.5.json")
        );
        assert_eq!(layout.natives_dir(), PathBuf::from("/data/libraries/natives"));
        assert_eq!(layout.global_profiles(), PathBuf::from("/data/launcher_profiles.json"));
        assert_eq!(
            layout.local_profiles(),
            PathBuf::from("/data/pack/launcher_profiles.json")
        );
    }

    #[test]
    fn stage_order_and_names() {
        let names: Vec<&str> = InstallStage::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "PREPARE",
                "DOWNLOAD_ENGINE",
                "DOWNLOAD_LIBRARIES",
                "DOWNLOAD_ASSETS",
                "DOWNLOAD_PATCH",
                "SYNC_PACKAGES",
                "DONE"
            ]
        );
        assert_eq!(InstallStage::Done.index(), InstallStage::TOTAL);
    }

    #[tokio::test]
    async fn channel_reporter_preserves_order() {
        let (reporter, mut rx, cancel) = ChannelProgressReporter::channel();
        reporter.start_step(InstallStage::DownloadAssets);
        reporter.set_message("a");
        reporter.set_substep(Some("x"), Some(1), Some(2));
        reporter.done(true, None);

        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::Stage {
                stage: InstallStage::DownloadAssets,
                current: 3,
                total: 6
            })
        );
        assert_eq!(rx.recv().await, Some(ProgressEvent::Message("a".into())));
        assert!(matches!(rx.recv().await, Some(ProgressEvent::Substep { .. })));
        assert!(matches!(
            rx.recv().await,
            Some(ProgressEvent::Finished { success: true, .. })
        ));

        assert!(!reporter.is_cancelled());
        cancel.send(true).unwrap();
        assert!(reporter.is_cancelled());
    }

    #[tokio::test]
    async fn markers_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("root/version");
        assert_eq!(read_marker(&path).await.unwrap(), None);
        write_marker(&path, "7").await.unwrap();
        assert_eq!(read_marker(&path).await.unwrap().as_deref(), Some("7"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "7");
    }
}
