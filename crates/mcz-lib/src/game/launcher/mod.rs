//! Version resolution and launch command assembly
pub mod arguments;
pub mod process;
pub mod resolver;
pub mod rules;
pub mod version_parser;

pub use arguments::{build_arguments, build_launch_command, LaunchCommand, LaunchContext};
pub use process::{find_java, run_serversync, ProcessLauncher, SystemProcessLauncher};
pub use resolver::{EffectiveManifest, VersionResolver};
pub use rules::{Environment, FeatureSet, OsDescriptor};
pub use version_parser::{Argument, Library, VersionManifest};
