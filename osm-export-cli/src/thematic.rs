//! Thematic command: build theme tables and export them as shapefiles.

use std::io::{BufReader, Write};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osm_export_core::{CategorisedTag, StagingLayout};
use osm_export_data::{ProcessRunner, ThematicConverter, ThematicJob, ToolPaths, ToolRunner};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_GEOPACKAGE, ARG_JOB_NAME, ARG_SHAPEFILE, ARG_STAGING_DIR, ARG_SUBPROCESS_TIMEOUT,
    ARG_TAGS, CliError, ENV_THEMATIC_GEOPACKAGE, ENV_THEMATIC_JOB_NAME, ENV_THEMATIC_SHAPEFILE,
    ENV_THEMATIC_STAGING_DIR, ENV_THEMATIC_TAGS, write_json,
};

/// CLI arguments for the `thematic` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Copy a geo-package into the staging directory, add one \
                 table per theme and geometry type from a JSON list of \
                 categorised tags, export the theme tables as shapefiles \
                 and optionally zip them. Prints the per-stage results as \
                 JSON.",
    about = "Convert a geo-package into thematic shapefiles"
)]
#[ortho_config(prefix = "OSM_EXPORT")]
pub(crate) struct ThematicArgs {
    /// Source geo-package; it is never modified.
    #[arg(long = ARG_GEOPACKAGE, value_name = "path")]
    #[serde(default)]
    pub(crate) geopackage: Option<Utf8PathBuf>,
    /// JSON array of categorised tags.
    #[arg(long = ARG_TAGS, value_name = "path")]
    #[serde(default)]
    pub(crate) tags: Option<Utf8PathBuf>,
    /// Shapefile output directory; the archive is `<shapefile>.zip`.
    #[arg(long = ARG_SHAPEFILE, value_name = "dir")]
    #[serde(default)]
    pub(crate) shapefile: Option<Utf8PathBuf>,
    /// Job name used for the working geo-package copy.
    #[arg(long = ARG_JOB_NAME, value_name = "name")]
    #[serde(default)]
    pub(crate) job_name: Option<String>,
    /// Staging directory for the working copy and schema script.
    #[arg(long = ARG_STAGING_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) staging_dir: Option<Utf8PathBuf>,
    /// Bound for each external tool, in seconds.
    #[arg(long = ARG_SUBPROCESS_TIMEOUT, value_name = "seconds")]
    #[serde(default)]
    pub(crate) subprocess_timeout: Option<u64>,
    /// Path to the `spatialite` executable.
    #[arg(long, value_name = "path")]
    #[serde(default)]
    pub(crate) spatialite: Option<String>,
    /// Path to the `ogr2ogr` executable.
    #[arg(long, value_name = "path")]
    #[serde(default)]
    pub(crate) ogr2ogr: Option<String>,
    /// Path to the `zip` executable.
    #[arg(long, value_name = "path")]
    #[serde(default)]
    pub(crate) zip: Option<String>,
    /// Archive the shapefile directory and remove it afterwards.
    #[arg(long)]
    #[serde(default)]
    pub(crate) zipped: bool,
    /// Log at debug level, including captured tool output.
    #[arg(long)]
    #[serde(default)]
    pub(crate) debug: bool,
}

impl ThematicArgs {
    pub(crate) fn into_config(self) -> Result<ThematicConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ThematicConfig::try_from(merged)
    }
}

/// Resolved `thematic` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ThematicConfig {
    pub(crate) geopackage: Utf8PathBuf,
    pub(crate) tags_path: Utf8PathBuf,
    pub(crate) shapefile: Utf8PathBuf,
    pub(crate) layout: StagingLayout,
    pub(crate) zipped: bool,
    pub(crate) tools: ToolPaths,
    pub(crate) subprocess_timeout: Option<Duration>,
    pub(crate) debug: bool,
}

impl ThematicConfig {
    /// Assemble the converter job, reading the categorised tags from disk.
    pub(crate) fn job(&self) -> Result<ThematicJob, CliError> {
        let tags = load_tags(&self.tags_path)?;
        Ok(ThematicJob::new(
            self.geopackage.clone(),
            self.shapefile.clone(),
            self.layout.clone(),
        )
        .with_tags(tags)
        .with_zipped(self.zipped))
    }
}

impl TryFrom<ThematicArgs> for ThematicConfig {
    type Error = CliError;

    fn try_from(args: ThematicArgs) -> Result<Self, Self::Error> {
        let geopackage = args.geopackage.ok_or(CliError::MissingArgument {
            field: ARG_GEOPACKAGE,
            env: ENV_THEMATIC_GEOPACKAGE,
        })?;
        let tags_path = args.tags.ok_or(CliError::MissingArgument {
            field: ARG_TAGS,
            env: ENV_THEMATIC_TAGS,
        })?;
        let shapefile = args.shapefile.ok_or(CliError::MissingArgument {
            field: ARG_SHAPEFILE,
            env: ENV_THEMATIC_SHAPEFILE,
        })?;
        let job_name = args.job_name.ok_or(CliError::MissingArgument {
            field: ARG_JOB_NAME,
            env: ENV_THEMATIC_JOB_NAME,
        })?;
        let staging_dir = args.staging_dir.ok_or(CliError::MissingArgument {
            field: ARG_STAGING_DIR,
            env: ENV_THEMATIC_STAGING_DIR,
        })?;
        let layout = StagingLayout::new(staging_dir, job_name).map_err(|source| {
            CliError::InvalidArgument {
                field: ARG_JOB_NAME,
                source,
            }
        })?;

        let mut tools = ToolPaths::default();
        if let Some(path) = args.spatialite {
            tools.spatialite = path;
        }
        if let Some(path) = args.ogr2ogr {
            tools.ogr2ogr = path;
        }
        if let Some(path) = args.zip {
            tools.zip = path;
        }

        Ok(Self {
            geopackage,
            tags_path,
            shapefile,
            layout,
            zipped: args.zipped,
            tools,
            subprocess_timeout: args.subprocess_timeout.map(Duration::from_secs),
            debug: args.debug,
        })
    }
}

/// Loads a JSON array of [`CategorisedTag`] values from disk.
pub(crate) fn load_tags(path: &Utf8Path) -> Result<Vec<CategorisedTag>, CliError> {
    let file = osm_export_fs::open_file(path).map_err(|source| CliError::OpenTags {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::ParseTags {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn run_thematic(args: ThematicArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    crate::init_logging(config.debug);
    let runner = ProcessRunner::new()
        .map_err(CliError::ToolRunner)?
        .with_default_timeout(config.subprocess_timeout)
        .with_debug(config.debug);
    execute_thematic(&config, runner, writer)
}

/// Run every thematic stage with `runner`, print the results and fail on
/// the first failed stage.
pub(crate) fn execute_thematic<R: ToolRunner>(
    config: &ThematicConfig,
    runner: R,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let job = config.job()?;
    let staging = job.layout().directory();
    osm_export_fs::ensure_dir(staging).map_err(|source| CliError::CreateStagingDirectory {
        path: staging.to_path_buf(),
        source,
    })?;

    let mut converter = ThematicConverter::new(job, runner, config.tools.clone())?
        .with_timeout(config.subprocess_timeout);
    let results = converter.run();
    write_json(writer, &results)?;
    match results.iter().find(|result| !result.succeeded) {
        Some(failed) => Err(CliError::ThematicStageFailed {
            stage: failed.stage,
            detail: failed.error_detail.clone().unwrap_or_default(),
        }),
        None => Ok(()),
    }
}
