pub mod installer;
pub mod launcher;
pub mod modpack;

pub use installer::{UpdateOutcome, UpdateState, Updater};
pub use launcher::{Environment, LaunchCommand, LaunchContext};
pub use modpack::ModpackManifest;
