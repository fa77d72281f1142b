//! Update and install engine for a modpack game launcher.
//!
//! [`Updater`] brings an install root to the state pinned by a modpack
//! manifest: engine version, libraries, assets, the Forge patch and the
//! pack's own files. The launcher module turns the installed version into
//! a command line.

pub mod auth;
pub mod config;
pub mod error;
pub mod game;
pub mod utils;

pub use error::{AuthError, LauncherError};
pub use game::installer::types::{
    ChannelProgressReporter, InstallLayout, InstallStage, ProgressEvent, ProgressReporter,
    SilentProgressReporter,
};
pub use game::installer::{CheckOutcome, UpdateOutcome, UpdateState, Updater};
