use anyhow::Result;
use futures::future::BoxFuture;
use std::path::PathBuf;

/// Command line for one run of the external Forge installer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchInvocation {
    pub java: PathBuf,
    pub wrapper_jar: PathBuf,
    pub installer_jar: PathBuf,
    pub entry_point: String,
    /// Working directory and sole program argument
    pub root: PathBuf,
    pub classpath_separator: String,
}

impl PatchInvocation {
    /// Arguments after the java executable
    pub fn args(&self) -> Vec<String> {
        vec![
            "-cp".to_string(),
            format!(
                "{}{}{}",
                self.wrapper_jar.display(),
                self.classpath_separator,
                self.installer_jar.display()
            ),
            self.entry_point.clone(),
            self.root.display().to_string(),
        ]
    }
}

/// Runs the mod-loader installer. The only contract is the files it
/// leaves under the root.
pub trait PatchInstaller: Send + Sync {
    /// Run to completion and return the process exit code
    /// (`None` when terminated by a signal).
    fn run<'a>(&'a self, invocation: &'a PatchInvocation) -> BoxFuture<'a, Result<Option<i32>>>;
}
