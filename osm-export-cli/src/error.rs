//! Error types emitted by the OSM export CLI.
//!
//! Keep this error type reasonably small; every command helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use osm_export_core::{ConfigurationError, Stage};
use osm_export_data::{FetchError, PipelineError, ThematicError, ToolError};
use thiserror::Error;

/// Errors emitted by the OSM export CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A merged option failed domain validation.
    #[error("invalid {field}: {source}")]
    InvalidArgument {
        field: &'static str,
        #[source]
        source: ConfigurationError,
    },
    /// Opening the categorised tags file failed.
    #[error("failed to open tags file {path:?}: {source}")]
    OpenTags {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The categorised tags file is not valid JSON.
    #[error("failed to parse tags JSON at {path:?}: {source}")]
    ParseTags {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The staging directory could not be created.
    #[error("failed to create staging directory {path:?}: {source}")]
    CreateStagingDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The Overpass HTTP client could not be built.
    #[error("failed to prepare the Overpass client: {0}")]
    OverpassClient(#[source] FetchError),
    /// The extract pipeline could not be assembled.
    #[error("failed to prepare the extract pipeline: {0}")]
    Pipeline(#[from] PipelineError),
    /// The extract ran but did not produce its output.
    #[error("extract {job_name:?} failed: {detail}")]
    ExtractFailed { job_name: String, detail: String },
    /// The subprocess runner could not start.
    #[error("failed to start the tool runner: {0}")]
    ToolRunner(#[source] ToolError),
    /// The thematic converter rejected its job.
    #[error("failed to prepare thematic conversion: {0}")]
    Thematic(#[from] ThematicError),
    /// A thematic stage failed.
    #[error("thematic {stage} stage failed: {detail}")]
    ThematicStageFailed { stage: Stage, detail: String },
    /// Serialising the command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing the command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
