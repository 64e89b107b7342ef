//! Command Runner: one shell invocation, captured output.
//!
//! The command line is handed to the host shell as-is, so pipes, redirects
//! and globs are interpreted rather than escaped. That is the point of this
//! component; only pass it strings you are prepared to see expanded.

use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by [`run_command`].
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn shell")]
    Spawn(#[from] std::io::Error),
    #[error("command failed ({status}): {}", String::from_utf8_lossy(.stderr))]
    NonZeroExit { status: ExitStatus, stderr: Vec<u8> },
}

/// Execute `command` through the host shell and capture its output.
///
/// Blocks until the child exits. Exit code zero returns the raw stdout
/// bytes; any other exit carries the captured stderr bytes instead. The
/// child inherits the environment and stdin.
pub fn run_command(command: &str) -> Result<Vec<u8>, ExecError> {
    debug!("Spawning shell for: {}", command);

    let output = shell_command(command).stdin(Stdio::inherit()).output()?;

    debug!("Child exited with {}", output.status);
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(ExecError::NonZeroExit {
            status: output.status,
            stderr: output.stderr,
        })
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}
