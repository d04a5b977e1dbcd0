//! Recording [`ToolRunner`] double used by unit and behaviour tests.
//!
//! The runner never spawns processes. It records each invocation, snapshots
//! small text files named by the arguments or the stdin redirect at call
//! time, and optionally materialises the outputs the real tools would write.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};

use super::{Invocation, ToolError, ToolOutput, ToolRunner};

const SNAPSHOT_LIMIT_BYTES: u64 = 64 * 1024;

/// Side effect applied when a program is invoked.
pub type Effect = Arc<dyn Fn(&Invocation) -> io::Result<()> + Send + Sync>;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedInvocation {
    /// The invocation as received.
    pub invocation: Invocation,
    /// Contents of the stdin redirect at call time.
    pub stdin_contents: Option<String>,
    /// Contents of small text files named by arguments at call time.
    pub argument_files: BTreeMap<Utf8PathBuf, String>,
}

#[derive(Debug, Clone)]
enum Outcome {
    Exit { exit_code: i32, stderr: String },
    Timeout,
}

/// Test double recording invocations with scripted per-program outcomes.
#[derive(Default, Clone)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<RecordedInvocation>>>,
    outcomes: HashMap<String, Outcome>,
    effects: HashMap<String, Effect>,
}

impl std::fmt::Debug for RecordingRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingRunner")
            .field("calls", &self.calls)
            .field("outcomes", &self.outcomes)
            .field("effects", &self.effects.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RecordingRunner {
    /// Runner where every program succeeds without side effects.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that writes plausible outputs for each pipeline tool.
    ///
    /// - `osmconvert` and `osmfilter` write their `-o=` target.
    /// - `ogr2ogr` creates the shapefile directory with one layer per
    ///   requested table (or a single `points` layer).
    /// - `zip` writes the sorted file list of the directory it archives.
    #[must_use]
    pub fn materialising() -> Self {
        Self::new()
            .with_effect("osmconvert", write_output_flag)
            .with_effect("osmfilter", write_output_flag)
            .with_effect("ogr2ogr", write_shapefiles)
            .with_effect("zip", write_archive_listing)
    }

    /// Make `program` exit with `exit_code` and `stderr`.
    #[must_use]
    pub fn failing(mut self, program: &str, exit_code: i32, stderr: &str) -> Self {
        self.outcomes.insert(
            program.to_owned(),
            Outcome::Exit {
                exit_code,
                stderr: stderr.to_owned(),
            },
        );
        self
    }

    /// Make `program` report a timeout.
    #[must_use]
    pub fn timing_out(mut self, program: &str) -> Self {
        self.outcomes.insert(program.to_owned(), Outcome::Timeout);
        self
    }

    /// Run `effect` whenever `program` is invoked, before its outcome.
    #[must_use]
    pub fn with_effect<F>(mut self, program: &str, effect: F) -> Self
    where
        F: Fn(&Invocation) -> io::Result<()> + Send + Sync + 'static,
    {
        self.effects.insert(program.to_owned(), Arc::new(effect));
        self
    }

    /// Every recorded call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedInvocation> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded calls of `program`.
    #[must_use]
    pub fn calls_to(&self, program: &str) -> Vec<RecordedInvocation> {
        self.calls()
            .into_iter()
            .filter(|call| call.invocation.program_name() == program)
            .collect()
    }

    /// Program names in call order.
    #[must_use]
    pub fn programs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| call.invocation.program_name().to_owned())
            .collect()
    }
}

impl ToolRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        let recorded = RecordedInvocation {
            invocation: invocation.clone(),
            stdin_contents: invocation.stdin().and_then(snapshot),
            argument_files: invocation
                .arguments()
                .iter()
                .filter_map(|arg| {
                    let path = Utf8Path::new(argument_path(arg));
                    snapshot(path).map(|contents| (path.to_path_buf(), contents))
                })
                .collect(),
        };
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(recorded);

        let program = invocation.program_name();
        if let Some(effect) = self.effects.get(program) {
            effect(invocation).map_err(|source| ToolError::Wait {
                command: invocation.command_line(),
                source,
            })?;
        }
        match self.outcomes.get(program) {
            Some(Outcome::Exit { exit_code, stderr }) => Err(ToolError::Exit {
                command: invocation.command_line(),
                exit_code: Some(*exit_code),
                stderr: stderr.clone(),
            }),
            Some(Outcome::Timeout) => Err(ToolError::Timeout {
                command: invocation.command_line(),
                timeout: invocation.timeout().unwrap_or(Duration::ZERO),
            }),
            None => Ok(ToolOutput::default()),
        }
    }
}

/// Strip a `--flag=` or `-o=` prefix, leaving the path-like value.
fn argument_path(arg: &str) -> &str {
    if arg.starts_with('-') {
        arg.split_once('=').map_or(arg, |(_, value)| value)
    } else {
        arg
    }
}

fn snapshot(path: &Utf8Path) -> Option<String> {
    match osm_export_fs::inspect(path) {
        Ok(osm_export_fs::PathPresence::File { len }) if len <= SNAPSHOT_LIMIT_BYTES => {
            osm_export_fs::read_to_string(path).ok()
        }
        _ => None,
    }
}

fn output_flag(invocation: &Invocation) -> Option<&str> {
    invocation
        .arguments()
        .iter()
        .find_map(|arg| arg.strip_prefix("-o="))
}

fn write_output_flag(invocation: &Invocation) -> io::Result<()> {
    let Some(target) = output_flag(invocation) else {
        return Ok(());
    };
    let body = format!("<!-- written by {} -->\n", invocation.program_name());
    osm_export_fs::write_file(Utf8Path::new(target), body)
}

fn write_shapefiles(invocation: &Invocation) -> io::Result<()> {
    // ogr2ogr -f "ESRI Shapefile" <dir> <gpkg> [options] [layers...]
    let args = invocation.arguments();
    let Some(directory) = args.get(2).map(Utf8Path::new) else {
        return Ok(());
    };
    osm_export_fs::ensure_dir(directory)?;
    let layers: Vec<&String> = args
        .iter()
        .skip(4)
        .filter(|arg| !arg.starts_with('-') && !arg.contains('='))
        .collect();
    if layers.is_empty() {
        osm_export_fs::write_file(&directory.join("points.shp"), "shp")?;
    }
    for layer in layers {
        osm_export_fs::write_file(&directory.join(format!("{layer}.shp")), "shp")?;
        osm_export_fs::write_file(&directory.join(format!("{layer}.dbf")), "dbf")?;
    }
    Ok(())
}

fn write_archive_listing(invocation: &Invocation) -> io::Result<()> {
    // zip -j -r <archive> <directory>
    let args = invocation.arguments();
    let (Some(archive), Some(directory)) = (args.get(2), args.get(3)) else {
        return Ok(());
    };
    let listing = osm_export_fs::list_files(Utf8Path::new(directory))?.join("\n");
    osm_export_fs::write_file(Utf8Path::new(archive), listing)
}
