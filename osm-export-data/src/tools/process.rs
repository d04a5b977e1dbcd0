use std::process::Stdio;
use std::time::Duration;

use log::debug;
use tokio::process::Command;

use super::{Invocation, ToolError, ToolOutput, ToolRunner};
use crate::BlockingRuntime;

/// [`ToolRunner`] spawning real processes.
///
/// Children are killed when their timeout expires. Captured output is logged
/// at `debug` only when `debug` is enabled.
#[derive(Debug)]
pub struct ProcessRunner {
    runtime: BlockingRuntime,
    default_timeout: Option<Duration>,
    debug: bool,
}

impl ProcessRunner {
    /// Build a runner with no default timeout and debug output disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Runtime`] when the runtime cannot start.
    pub fn new() -> Result<Self, ToolError> {
        let runtime = BlockingRuntime::new().map_err(|source| ToolError::Runtime { source })?;
        Ok(Self {
            runtime,
            default_timeout: None,
            debug: false,
        })
    }

    /// Bound invocations that do not carry their own timeout.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Log captured stdout and stderr at `debug`.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Run `invocation` on the caller's runtime.
    ///
    /// # Errors
    ///
    /// See [`ToolError`].
    pub async fn run_async(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        let command_line = invocation.command_line();
        let mut command = Command::new(invocation.program());
        command
            .args(invocation.arguments())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        match invocation.stdin() {
            Some(path) => {
                let file = osm_export_fs::open_file(path).map_err(|source| ToolError::Stdin {
                    command: command_line.clone(),
                    path: path.to_path_buf(),
                    source,
                })?;
                command.stdin(Stdio::from(file));
            }
            None => {
                command.stdin(Stdio::null());
            }
        }

        debug!("running `{command_line}`");
        let child = command.spawn().map_err(|source| ToolError::Spawn {
            command: command_line.clone(),
            source,
        })?;
        // Dropping the pending wait kills the child.
        let waiting = child.wait_with_output();
        let finished = match invocation.timeout().or(self.default_timeout) {
            Some(limit) => tokio::time::timeout(limit, waiting)
                .await
                .map_err(|_| ToolError::Timeout {
                    command: command_line.clone(),
                    timeout: limit,
                })?,
            None => waiting.await,
        };
        let output = finished.map_err(|source| ToolError::Wait {
            command: command_line.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if self.debug {
            debug!("`{command_line}` stdout: {stdout}");
            debug!("`{command_line}` stderr: {stderr}");
        }
        if !output.status.success() {
            return Err(ToolError::Exit {
                command: command_line,
                exit_code: output.status.code(),
                stderr,
            });
        }
        Ok(ToolOutput { stdout, stderr })
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        self.runtime
            .block_on(self.run_async(invocation))
            .map_err(|source| ToolError::Runtime { source })?
    }
}
