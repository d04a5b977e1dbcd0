//! Query command: render the Overpass QL for a bounding box.

use std::io::Write;

use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osm_export_core::{
    BoundingBox, DEFAULT_MAX_SIZE_BYTES, DEFAULT_TIMEOUT_SECONDS, OverpassQuery, QueryBuilder,
};
use serde::{Deserialize, Serialize};

use crate::{ARG_BBOX, ARG_MAX_SIZE, ARG_TIMEOUT, CliError, ENV_QUERY_BBOX};

/// CLI arguments for the `query` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Render the Overpass QL statement that downloads every node, \
                 way and relation inside a bounding box. Nothing is sent to \
                 the interpreter.",
    about = "Print the Overpass query for a bounding box"
)]
#[ortho_config(prefix = "OSM_EXPORT")]
pub(crate) struct QueryArgs {
    /// Bounding box as `miny,minx,maxy,maxx`.
    #[arg(long = ARG_BBOX, value_name = "miny,minx,maxy,maxx", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
    /// Maximum response size requested from the interpreter, in bytes.
    #[arg(long = ARG_MAX_SIZE, value_name = "bytes")]
    #[serde(default)]
    pub(crate) max_size: Option<u64>,
    /// Query timeout, in seconds.
    #[arg(long = ARG_TIMEOUT, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout: Option<u64>,
}

impl QueryArgs {
    pub(crate) fn into_config(self) -> Result<QueryConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        QueryConfig::try_from(merged)
    }
}

/// Resolved `query` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueryConfig {
    pub(crate) bbox: BoundingBox,
    pub(crate) builder: QueryBuilder,
}

impl QueryConfig {
    pub(crate) fn render(&self) -> OverpassQuery {
        self.builder.build(&self.bbox)
    }
}

impl TryFrom<QueryArgs> for QueryConfig {
    type Error = CliError;

    fn try_from(args: QueryArgs) -> Result<Self, Self::Error> {
        let raw = args.bbox.ok_or(CliError::MissingArgument {
            field: ARG_BBOX,
            env: ENV_QUERY_BBOX,
        })?;
        let bbox = raw
            .parse::<BoundingBox>()
            .map_err(|source| CliError::InvalidArgument {
                field: ARG_BBOX,
                source,
            })?;
        let builder = QueryBuilder::new(
            args.max_size.unwrap_or(DEFAULT_MAX_SIZE_BYTES),
            args.timeout.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        );
        Ok(Self { bbox, builder })
    }
}

pub(crate) fn run_query(args: QueryArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    write_query(writer, &config.render())
}

pub(crate) fn write_query(writer: &mut dyn Write, query: &OverpassQuery) -> Result<(), CliError> {
    writeln!(writer, "{query}").map_err(CliError::WriteOutput)
}
