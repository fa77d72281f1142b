use crate::game::installer::core::traits::{PatchInstaller, PatchInvocation};
use crate::utils::process::LauncherCommandExt;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::process::Stdio;
use tokio::process::Command;

/// Runs the Forge installer wrapper as a child Java process with inherited
/// stdio and waits for it to exit. Not cancellable once started.
pub struct JavaPatchInstaller;

impl PatchInstaller for JavaPatchInstaller {
    fn run<'a>(&'a self, invocation: &'a PatchInvocation) -> BoxFuture<'a, Result<Option<i32>>> {
        Box::pin(run_installer(invocation))
    }
}

async fn run_installer(invocation: &PatchInvocation) -> Result<Option<i32>> {
    let mut command = Command::new(&invocation.java);
    command
        .args(invocation.args())
        .current_dir(&invocation.root)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .suppress_console();

    log::debug!("Executing: {:?}", command);

    let status = command
        .status()
        .await
        .with_context(|| format!("Failed to spawn Forge installer with {:?}", invocation.java))?;

    log::info!("Forge installer exited with {}", status);
    Ok(status.code())
}
