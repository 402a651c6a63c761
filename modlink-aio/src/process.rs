// modlink-aio/src/process.rs
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use modlink_common::error::{LinkFailureKind, ModlinkError, Result};
use tracing::{debug, error};

/// Runs an external command to completion and captures its output.
///
/// A non-zero exit status is returned in `Output`, not as an error; only a
/// failure to start the process is an error.
pub fn run_command(
    program: &Path,
    args: &[OsString],
    cwd: Option<PathBuf>,
    envs: Option<HashMap<String, String>>,
) -> Result<Output> {
    debug!(
        "Running command: {} {:?} (cwd: {:?}, envs: {:?})",
        program.display(),
        args,
        cwd,
        envs.as_ref().map(|e| e.keys().collect::<Vec<_>>())
    );
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    if let Some(env_map) = envs {
        cmd.envs(env_map);
    }
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());

    match cmd.output() {
        Ok(output) => {
            if !output.status.success() {
                debug!("Command failed with status: {}", output.status);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.trim().is_empty() {
                    debug!("Stdout:\n{}", stdout.trim());
                }
                if !stderr.trim().is_empty() {
                    debug!("Stderr:\n{}", stderr.trim());
                }
            } else {
                debug!("Command finished successfully.");
            }
            Ok(output)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!("Command not found: {}", program.display());
            Err(ModlinkError::LinkFailure {
                kind: LinkFailureKind::ToolNotFound,
                diagnostic: format!("{} could not be executed: {e}", program.display()),
            })
        }
        Err(e) => {
            error!("Failed to execute command {}: {}", program.display(), e);
            Err(ModlinkError::from(e))
        }
    }
}
