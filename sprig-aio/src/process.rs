// sprig-aio/src/process.rs
use std::collections::HashMap;
use std::path::Path;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use sprig_common::error::{Result, SprigError};
use tokio::process::Command;
use tracing::{debug, error, warn};

/// How a bounded command run ended.
#[derive(Debug)]
pub enum CommandOutcome {
    /// The process exited (successfully or not) within the time limit.
    Completed(Output),
    /// The limit elapsed; the process was killed.
    TimedOut,
}

/// Runs `program` with stdin closed and output captured, killing it when
/// `limit` elapses.
///
/// Failing to start the process is an `Err`; everything after that is a
/// [`CommandOutcome`].
pub async fn run_command_with_timeout(
    program: &Path,
    args: &[String],
    envs: &HashMap<String, String>,
    cwd: Option<&Path>,
    limit: Duration,
) -> Result<CommandOutcome> {
    debug!(
        "Running command: {} {:?} (cwd: {:?}, envs: {:?}, timeout: {:?})",
        program.display(),
        args,
        cwd,
        envs.keys().collect::<Vec<_>>(),
        limit
    );

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.envs(envs);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.kill_on_drop(true);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let child = cmd.spawn().map_err(|e| {
        error!("Failed to execute {}: {}", program.display(), e);
        SprigError::Io(Arc::new(e))
    })?;

    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            if output.status.success() {
                debug!("Command {} finished successfully.", program.display());
            } else {
                debug!(
                    "Command {} exited with status: {}",
                    program.display(),
                    output.status
                );
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    debug!("Stderr:\n{}", stderr.trim());
                }
            }
            Ok(CommandOutcome::Completed(output))
        }
        Ok(Err(e)) => {
            error!("Failed waiting for {}: {}", program.display(), e);
            Err(SprigError::Io(Arc::new(e)))
        }
        Err(_) => {
            warn!(
                "Command {} exceeded {:?}, killed",
                program.display(),
                limit
            );
            Ok(CommandOutcome::TimedOut)
        }
    }
}
