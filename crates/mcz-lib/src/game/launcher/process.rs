/// Spawning the game and its helper processes
use crate::game::launcher::arguments::LaunchCommand;
use crate::utils::process::LauncherCommandExt;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Locate the java executable: `<java_home>/bin/java[w.exe]`, else `java` on PATH
pub fn find_java(java_home: Option<&Path>) -> PathBuf {
    if let Some(home) = java_home {
        let exe = if cfg!(windows) { "javaw.exe" } else { "java" };
        return home.join("bin").join(exe);
    }
    which::which("java").unwrap_or_else(|_| PathBuf::from("java"))
}

/// Runs a launch command to completion
pub trait ProcessLauncher: Send + Sync {
    /// Exit code, `None` when the process was killed by a signal
    fn run<'a>(&'a self, command: &'a LaunchCommand) -> BoxFuture<'a, Result<Option<i32>>>;
}

/// Spawns the command and forwards its output lines to the log
pub struct SystemProcessLauncher;

impl ProcessLauncher for SystemProcessLauncher {
    fn run<'a>(&'a self, command: &'a LaunchCommand) -> BoxFuture<'a, Result<Option<i32>>> {
        Box::pin(async move {
            log::info!(
                "Launching {:?} in {:?} ({} arguments)",
                command.program,
                command.working_dir,
                command.args.len()
            );

            tokio::fs::create_dir_all(&command.working_dir)
                .await
                .with_context(|| format!("Failed to create {:?}", command.working_dir))?;

            let mut child = Command::new(&command.program)
                .args(&command.args)
                .current_dir(&command.working_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .suppress_console()
                .spawn()
                .with_context(|| format!("Failed to spawn {:?}", command.program))?;

            if let Some(pid) = child.id() {
                log::info!("Game process started with PID: {}", pid);
            }

            let stdout = child.stdout.take().map(|out| {
                tokio::spawn(async move {
                    let mut lines = BufReader::new(out).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        log::info!("[game] {}", line);
                    }
                })
            });
            let stderr = child.stderr.take().map(|err| {
                tokio::spawn(async move {
                    let mut lines = BufReader::new(err).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        log::warn!("[game] {}", line);
                    }
                })
            });

            let status = child
                .wait()
                .await
                .context("Failed to wait for game process")?;
            for task in [stdout, stderr].into_iter().flatten() {
                let _ = task.await;
            }

            if status.success() {
                log::info!("Game process exited successfully");
            } else {
                log::error!("Game process exited with error: {}", status);
            }
            Ok(status.code())
        })
    }
}

/// Build the ServerSync pre-launch command if the client jar is installed
pub fn serversync_command(java: &Path, install_root: &Path) -> Option<LaunchCommand> {
    let jar = crate::game::modpack::serversync_jar_path(install_root);
    if !jar.is_file() {
        return None;
    }
    Some(LaunchCommand {
        program: java.to_path_buf(),
        args: vec![
            "-jar".to_string(),
            jar.to_string_lossy().to_string(),
            "progress-only".to_string(),
        ],
        working_dir: install_root.to_path_buf(),
    })
}

/// Run ServerSync before the game. Returns false when nothing was run.
pub async fn run_serversync(
    launcher: &dyn ProcessLauncher,
    java: &Path,
    install_root: &Path,
) -> Result<bool> {
    let Some(command) = serversync_command(java, install_root) else {
        return Ok(false);
    };
    log::info!("Running ServerSync before launch");
    match launcher.run(&command).await? {
        Some(0) => {}
        code => log::warn!("ServerSync exited with {:?}", code),
    }
    Ok(true)
}
