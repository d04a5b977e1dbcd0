//! Errors raised while running external tools.

use std::{io, time::Duration};

use camino::Utf8PathBuf;
use thiserror::Error;

/// Failure of one tool invocation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ToolError {
    /// The process could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// Command line that was attempted.
        command: String,
        /// Error reported by the operating system.
        #[source]
        source: io::Error,
    },
    /// The stdin redirect could not be opened.
    #[error("failed to open {path} as stdin for `{command}`: {source}")]
    Stdin {
        /// Command line that was attempted.
        command: String,
        /// File that should have been redirected.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Waiting for the process or collecting its output failed.
    #[error("failed while waiting for `{command}`: {source}")]
    Wait {
        /// Command line being waited on.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The process exited unsuccessfully.
    #[error("`{command}` exited with {}: {stderr}", describe_exit(.exit_code))]
    Exit {
        /// Command line that failed.
        command: String,
        /// Exit code, or `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
    /// The process exceeded its timeout and was killed.
    #[error("`{command}` timed out after {timeout:?} and was terminated")]
    Timeout {
        /// Command line that timed out.
        command: String,
        /// Configured bound.
        timeout: Duration,
    },
    /// The runner's runtime could not start or cannot block here.
    #[error("process runtime unavailable: {source}")]
    Runtime {
        /// Error reported by Tokio.
        #[source]
        source: io::Error,
    },
}

impl ToolError {
    /// Whether the tool was killed for exceeding its timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Captured stderr of a failed exit.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Exit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    exit_code.map_or_else(
        || "no exit code (terminated by signal)".to_owned(),
        |code| format!("exit code {code}"),
    )
}
