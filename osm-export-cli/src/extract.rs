//! Extract command: download, convert and filter one bounding box.

use std::io::Write;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osm_export_core::{
    BoundingBox, ConfigurationError, ExtractRequest, OverpassSettings, StagingLayout,
};
use osm_export_data::{
    ExtractPipeline, HttpOverpassSource, OverpassSource, PipelineOptions, ToolPaths, ToolRunner,
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BBOX, ARG_FILTER, ARG_JOB_NAME, ARG_MAX_SIZE, ARG_RUN_ID, ARG_STAGING_ROOT,
    ARG_SUBPROCESS_TIMEOUT, ARG_TIMEOUT, ARG_URL, CliError, ENV_EXTRACT_BBOX,
    ENV_EXTRACT_JOB_NAME, ENV_EXTRACT_RUN_ID, ENV_EXTRACT_STAGING_ROOT, write_json,
};

/// CLI arguments for the `extract` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Download every OSM element inside a bounding box from an \
                 Overpass interpreter into <staging-root>/<run-id>, convert \
                 it to o5m and keep only the elements matching the --filter \
                 rules. Prints a JSON report with one result per stage.",
    about = "Download and filter an Overpass extract"
)]
#[ortho_config(prefix = "OSM_EXPORT")]
pub(crate) struct ExtractArgs {
    /// Bounding box as `miny,minx,maxy,maxx`.
    #[arg(long = ARG_BBOX, value_name = "miny,minx,maxy,maxx", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
    /// Name of the filtered output, `<job-name>.osm`.
    #[arg(long = ARG_JOB_NAME, value_name = "name")]
    #[serde(default)]
    pub(crate) job_name: Option<String>,
    /// Identifier of this run; its staging directory is exclusive to it.
    #[arg(long = ARG_RUN_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) run_id: Option<String>,
    /// Directory under which per-run staging directories are created.
    #[arg(long = ARG_STAGING_ROOT, value_name = "dir")]
    #[serde(default)]
    pub(crate) staging_root: Option<Utf8PathBuf>,
    /// Keep-rule (`key=value`, `key:value` or `key`); repeat for more.
    #[arg(long = ARG_FILTER, value_name = "rule")]
    #[serde(default)]
    pub(crate) filter: Option<Vec<String>>,
    /// Overpass interpreter endpoint.
    #[arg(long = ARG_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) url: Option<String>,
    /// Maximum response size requested from the interpreter, in bytes.
    #[arg(long = ARG_MAX_SIZE, value_name = "bytes")]
    #[serde(default)]
    pub(crate) max_size: Option<u64>,
    /// Query and HTTP request timeout, in seconds.
    #[arg(long = ARG_TIMEOUT, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout: Option<u64>,
    /// Bound for each external tool, in seconds.
    #[arg(long = ARG_SUBPROCESS_TIMEOUT, value_name = "seconds")]
    #[serde(default)]
    pub(crate) subprocess_timeout: Option<u64>,
    /// Path to the `osmconvert` executable.
    #[arg(long, value_name = "path")]
    #[serde(default)]
    pub(crate) osmconvert: Option<String>,
    /// Path to the `osmfilter` executable.
    #[arg(long, value_name = "path")]
    #[serde(default)]
    pub(crate) osmfilter: Option<String>,
    /// Keep `query.osm` and `query.o5m` after filtering.
    #[arg(long)]
    #[serde(default)]
    pub(crate) retain_intermediates: bool,
    /// Log at debug level, including captured tool output.
    #[arg(long)]
    #[serde(default)]
    pub(crate) debug: bool,
}

impl ExtractArgs {
    pub(crate) fn into_config(self) -> Result<ExtractConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ExtractConfig::try_from(merged)
    }
}

/// Resolved `extract` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExtractConfig {
    pub(crate) request: ExtractRequest,
    pub(crate) tools: ToolPaths,
    pub(crate) options: PipelineOptions,
}

impl TryFrom<ExtractArgs> for ExtractConfig {
    type Error = CliError;

    fn try_from(args: ExtractArgs) -> Result<Self, Self::Error> {
        let raw_bbox = args.bbox.ok_or(CliError::MissingArgument {
            field: ARG_BBOX,
            env: ENV_EXTRACT_BBOX,
        })?;
        let job_name = args.job_name.ok_or(CliError::MissingArgument {
            field: ARG_JOB_NAME,
            env: ENV_EXTRACT_JOB_NAME,
        })?;
        let run_id = args.run_id.ok_or(CliError::MissingArgument {
            field: ARG_RUN_ID,
            env: ENV_EXTRACT_RUN_ID,
        })?;
        let staging_root = args.staging_root.ok_or(CliError::MissingArgument {
            field: ARG_STAGING_ROOT,
            env: ENV_EXTRACT_STAGING_ROOT,
        })?;

        let bbox = raw_bbox
            .parse::<BoundingBox>()
            .map_err(|source| invalid(ARG_BBOX, source))?;
        let layout = StagingLayout::for_run(&staging_root, &run_id, job_name).map_err(|source| {
            let field = if matches!(source, ConfigurationError::InvalidJobName { .. }) {
                ARG_JOB_NAME
            } else {
                ARG_RUN_ID
            };
            invalid(field, source)
        })?;

        let mut overpass = match args.url {
            Some(url) => OverpassSettings::new(&url).map_err(|source| invalid(ARG_URL, source))?,
            None => OverpassSettings::default(),
        };
        if let Some(bytes) = args.max_size {
            overpass = overpass.with_max_response_bytes(bytes);
        }
        if let Some(seconds) = args.timeout {
            overpass = overpass.with_timeout_seconds(seconds);
        }

        let request = ExtractRequest::new(bbox, layout, args.filter.unwrap_or_default(), overpass)
            .map_err(|source| invalid(ARG_FILTER, source))?;

        let mut tools = ToolPaths::default();
        if let Some(path) = args.osmconvert {
            tools.osmconvert = path;
        }
        if let Some(path) = args.osmfilter {
            tools.osmfilter = path;
        }

        let options = PipelineOptions {
            debug: args.debug,
            subprocess_timeout: args.subprocess_timeout.map(Duration::from_secs),
            retain_intermediates: args.retain_intermediates,
        };
        Ok(Self {
            request,
            tools,
            options,
        })
    }
}

fn invalid(field: &'static str, source: ConfigurationError) -> CliError {
    CliError::InvalidArgument { field, source }
}

pub(crate) fn run_extract(args: ExtractArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    crate::init_logging(config.options.debug);
    let source = HttpOverpassSource::new(config.request.overpass().clone())
        .map_err(CliError::OverpassClient)?;
    let pipeline =
        ExtractPipeline::with_process_runner(source, config.tools.clone(), config.options.clone())?;
    execute_extract(&pipeline, &config.request, writer)
}

/// Run `pipeline`, print its report and fail when no output was produced.
pub(crate) fn execute_extract<S, R>(
    pipeline: &ExtractPipeline<S, R>,
    request: &ExtractRequest,
    writer: &mut dyn Write,
) -> Result<(), CliError>
where
    S: OverpassSource,
    R: ToolRunner,
{
    let report = pipeline.run(request);
    write_json(writer, &report)?;
    if report.succeeded {
        Ok(())
    } else {
        Err(CliError::ExtractFailed {
            job_name: report.job_name,
            detail: report.error.unwrap_or_default(),
        })
    }
}
