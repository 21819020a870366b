//! Shell command execution used by configured steps and providers.
//!
//! Commands are handed to the platform shell (`sh -c`, or `cmd /C` on
//! Windows) so authors can use pipes and redirections in `fruitconfig.yaml`.

use std::{
    io,
    path::Path,
    process::{Command, ExitStatus, Stdio},
};

use thiserror::Error;
use tracing::debug;

use crate::console;

/// Prefix echoed before a streamed command.
pub const SHELL_PROMPT: &str = "$ ";

/// Errors raised before a command produced an exit code.
#[derive(Debug, Error)]
pub enum ShellError {
    /// The shell could not be started (missing binary, bad working directory).
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The process ended without an exit code, e.g. killed by a signal.
    #[error("`{command}` was terminated before it could exit")]
    Terminated { command: String },
}

/// Captured result of a command run with [`run_captured`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

fn shell_command(command: &str, working_dir: &Path) -> Command {
    let mut process = if cfg!(windows) {
        let mut process = Command::new("cmd");
        process.arg("/C");
        process
    } else {
        let mut process = Command::new("sh");
        process.arg("-c");
        process
    };
    process.arg(command).current_dir(working_dir);
    process
}

fn exit_code(command: &str, status: ExitStatus) -> Result<i32, ShellError> {
    status.code().ok_or_else(|| ShellError::Terminated {
        command: command.to_string(),
    })
}

/// Runs `command` with inherited stdio and returns its exit code.
///
/// The command line is echoed first so it shows up inside the step output.
pub fn run_streaming(command: &str, working_dir: &Path) -> Result<i32, ShellError> {
    console::echo(format!("{SHELL_PROMPT}{command}"));
    debug!(command = %command, working_dir = %working_dir.display(), "shell command started");
    let status = shell_command(command, working_dir)
        .stdin(Stdio::inherit())
        .status()
        .map_err(|source| ShellError::Spawn {
            command: command.to_string(),
            source,
        })?;
    let code = exit_code(command, status)?;
    debug!(command = %command, code, "shell command finished");
    Ok(code)
}

/// Runs `command` and captures stdout and stderr as UTF-8 (lossy).
pub fn run_captured(command: &str, working_dir: &Path) -> Result<ShellOutput, ShellError> {
    debug!(command = %command, working_dir = %working_dir.display(), "shell capture started");
    let output = shell_command(command, working_dir)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| ShellError::Spawn {
            command: command.to_string(),
            source,
        })?;
    Ok(ShellOutput {
        code: exit_code(command, output.status)?,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
