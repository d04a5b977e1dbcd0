//! Structured invocation of the external OSM and GIS tools.
//!
//! Every tool is launched with an argument vector, never through a shell.
//! Standard output and error are captured; a non-zero exit is always an
//! error carrying the captured stderr.

mod error;
mod process;

#[doc(hidden)]
pub mod test_support;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

pub use error::ToolError;
pub use process::ProcessRunner;

/// Executables used by the pipeline, resolved on `PATH` unless absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    /// OSM XML to o5m converter.
    pub osmconvert: String,
    /// Keep-rule filter over o5m input.
    pub osmfilter: String,
    /// Spatial SQLite shell executing the schema script.
    pub spatialite: String,
    /// GDAL vector converter producing shapefiles.
    pub ogr2ogr: String,
    /// Archiver producing the flattened zip.
    pub zip: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            osmconvert: "osmconvert".to_owned(),
            osmfilter: "osmfilter".to_owned(),
            spatialite: "spatialite".to_owned(),
            ogr2ogr: "ogr2ogr".to_owned(),
            zip: "zip".to_owned(),
        }
    }
}

/// A single tool invocation: program, arguments, optional stdin file and
/// timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    stdin: Option<Utf8PathBuf>,
    timeout: Option<Duration>,
}

impl Invocation {
    /// Start an invocation of `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            timeout: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Redirect standard input from `path`.
    #[must_use]
    pub fn stdin_from(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    /// Bound the run time; `None` waits indefinitely.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Program file name without any directory, for matching in tests and
    /// logs.
    #[must_use]
    pub fn program_name(&self) -> &str {
        Utf8Path::new(&self.program)
            .file_name()
            .unwrap_or(&self.program)
    }

    /// Arguments in order.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// File redirected to standard input, if any.
    #[must_use]
    pub fn stdin(&self) -> Option<&Utf8Path> {
        self.stdin.as_deref()
    }

    /// Configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Human-readable command line used in diagnostics.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut rendered = self.program.clone();
        for arg in &self.args {
            rendered.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                rendered.push('\'');
                rendered.push_str(arg);
                rendered.push('\'');
            } else {
                rendered.push_str(arg);
            }
        }
        if let Some(stdin) = &self.stdin {
            rendered.push_str(" < ");
            rendered.push_str(stdin.as_str());
        }
        rendered
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Captured standard output, lossily decoded.
    pub stdout: String,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
}

/// Runs tool invocations to completion.
///
/// Implementations must treat a non-zero exit as [`ToolError::Exit`] and an
/// expired timeout as [`ToolError::Timeout`].
pub trait ToolRunner {
    /// Run `invocation`, blocking until it exits or times out.
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError>;
}

impl<T: ToolRunner + ?Sized> ToolRunner for &T {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        (**self).run(invocation)
    }
}

impl<T: ToolRunner + ?Sized> ToolRunner for Box<T> {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        (**self).run(invocation)
    }
}
