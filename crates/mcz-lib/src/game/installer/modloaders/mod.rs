pub mod forge;

pub use forge::installer::JavaPatchInstaller;
pub use forge::{install_forge, ForgeOutcome, ForgeRequest};
