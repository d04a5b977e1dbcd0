//! Command-line interface for the OSM export pipeline.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

mod error;
mod extract;
mod query;
mod thematic;

pub use error::CliError;
use extract::ExtractArgs;
use query::QueryArgs;
use thematic::ThematicArgs;

pub(crate) const ARG_BBOX: &str = "bbox";
pub(crate) const ARG_MAX_SIZE: &str = "max-size";
pub(crate) const ARG_TIMEOUT: &str = "timeout";
pub(crate) const ARG_JOB_NAME: &str = "job-name";
pub(crate) const ARG_RUN_ID: &str = "run-id";
pub(crate) const ARG_STAGING_ROOT: &str = "staging-root";
pub(crate) const ARG_FILTER: &str = "filter";
pub(crate) const ARG_URL: &str = "url";
pub(crate) const ARG_SUBPROCESS_TIMEOUT: &str = "subprocess-timeout";
pub(crate) const ARG_GEOPACKAGE: &str = "geopackage";
pub(crate) const ARG_TAGS: &str = "tags";
pub(crate) const ARG_SHAPEFILE: &str = "shapefile";
pub(crate) const ARG_STAGING_DIR: &str = "staging-dir";
pub(crate) const ENV_QUERY_BBOX: &str = "OSM_EXPORT_CMDS_QUERY_BBOX";
pub(crate) const ENV_EXTRACT_BBOX: &str = "OSM_EXPORT_CMDS_EXTRACT_BBOX";
pub(crate) const ENV_EXTRACT_JOB_NAME: &str = "OSM_EXPORT_CMDS_EXTRACT_JOB_NAME";
pub(crate) const ENV_EXTRACT_RUN_ID: &str = "OSM_EXPORT_CMDS_EXTRACT_RUN_ID";
pub(crate) const ENV_EXTRACT_STAGING_ROOT: &str = "OSM_EXPORT_CMDS_EXTRACT_STAGING_ROOT";
pub(crate) const ENV_THEMATIC_GEOPACKAGE: &str = "OSM_EXPORT_CMDS_THEMATIC_GEOPACKAGE";
pub(crate) const ENV_THEMATIC_TAGS: &str = "OSM_EXPORT_CMDS_THEMATIC_TAGS";
pub(crate) const ENV_THEMATIC_SHAPEFILE: &str = "OSM_EXPORT_CMDS_THEMATIC_SHAPEFILE";
pub(crate) const ENV_THEMATIC_JOB_NAME: &str = "OSM_EXPORT_CMDS_THEMATIC_JOB_NAME";
pub(crate) const ENV_THEMATIC_STAGING_DIR: &str = "OSM_EXPORT_CMDS_THEMATIC_STAGING_DIR";

/// Run the CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Query(args) => query::run_query(args, &mut stdout),
        Command::Extract(args) => extract::run_extract(args, &mut stdout),
        Command::Thematic(args) => thematic::run_thematic(args, &mut stdout),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "osm-export",
    about = "Extract OpenStreetMap data and convert it into thematic GIS layers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the Overpass QL query for a bounding box.
    Query(QueryArgs),
    /// Download, convert and filter an Overpass extract.
    Extract(ExtractArgs),
    /// Build theme tables and export them as shapefiles.
    Thematic(ThematicArgs),
}

/// Install the stderr log subscriber, honouring `RUST_LOG` unless `debug`
/// forces the `debug` level. Records emitted through `log` are bridged.
pub(crate) fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // A subscriber may already be installed when commands run in-process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
        .try_init();
}

/// Write `value` to `writer` as pretty-printed JSON followed by a newline.
pub(crate) fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
