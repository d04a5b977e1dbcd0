//! Test helpers for CLI workspaces and layered configuration overrides.

use super::*;
use crate::extract::{ExtractArgs, ExtractConfig};
use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

pub(super) const BBOX: &str = "27.6,85.2,27.8,85.4";

/// Temporary directory holding staging roots, geo-packages and tag files.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(name);
        std::fs::write(path.as_std_path(), contents).expect("write workspace file");
        path
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace").field("root", &self.root).finish()
    }
}

/// Values supplied by a configuration file or the environment.
#[derive(Debug, Clone, Default)]
pub(super) struct LayerOverrides {
    pub(super) url: Option<String>,
    pub(super) staging_root: Option<Utf8PathBuf>,
}

/// Fill fields the CLI left unset from the environment, then the file layer.
pub(super) fn merge_layers(
    mut cli_args: ExtractArgs,
    file_layer: Option<LayerOverrides>,
    env_layer: Option<LayerOverrides>,
) -> Result<ExtractConfig, CliError> {
    merge_field(
        &mut cli_args.url,
        extract_field(&env_layer, |layer| &layer.url),
        extract_field(&file_layer, |layer| &layer.url),
    );
    merge_field(
        &mut cli_args.staging_root,
        extract_field(&env_layer, |layer| &layer.staging_root),
        extract_field(&file_layer, |layer| &layer.staging_root),
    );
    ExtractConfig::try_from(cli_args)
}

fn merge_field<T: Clone>(target: &mut Option<T>, env_value: Option<T>, file_value: Option<T>) {
    if target.is_none()
        && let Some(value) = env_value.or(file_value)
    {
        *target = Some(value);
    }
}

fn extract_field<T: Clone>(
    layer: &Option<LayerOverrides>,
    accessor: fn(&LayerOverrides) -> &Option<T>,
) -> Option<T> {
    layer.as_ref().and_then(|entry| accessor(entry).clone())
}

/// Parse `argv` (without the program name) as an `extract` invocation.
pub(super) fn parse_extract(argv: &[String]) -> Result<ExtractArgs, CliError> {
    let mut invocation = vec!["osm-export".to_owned(), "extract".to_owned()];
    invocation.extend(argv.iter().cloned());
    let cli = Cli::try_parse_from(invocation).map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Extract(args) => Ok(args),
        other => panic!("expected extract command, found {other:?}"),
    }
}

/// Decode JSON written by a command.
pub(super) fn json_output(buffer: &[u8]) -> serde_json::Value {
    serde_json::from_slice(buffer).expect("command output is JSON")
}
