//! Network, disk and subprocess adapters for the OSM export pipeline.
//!
//! Responsibilities:
//! - Fetch Overpass extracts over HTTP into the staging directory.
//! - Drive the external OSM and GIS tools as structured subprocesses.
//! - Orchestrate the extract and thematic stages and report per-stage results.
//!
//! Boundaries:
//! - Do not encode domain validation (lives in `osm-export-core`).
//! - Never build shell command strings; every tool receives an argument
//!   vector.
//!
//! Invariants:
//! - Stages are synchronous and blocking; async I/O is confined behind an
//!   owned runtime.
//! - No global mutable state.
#![forbid(unsafe_code)]

pub mod artefact;
pub mod filter;
pub mod overpass;
pub mod pipeline;
mod runtime;
pub mod thematic;
pub mod tools;

pub use artefact::FileReference;
pub use filter::{
    FilterError, FilterMode, FilterOutcome, FilterTemplate, FormatConverter, OsmfilterTemplate,
    TagFilter,
};
pub use overpass::{
    FetchError, FetchReport, HttpOverpassSource, OverpassFetcher, OverpassSource, TransportError,
};
pub use pipeline::{ExtractPipeline, ExtractReport, PipelineError, PipelineOptions};
pub use runtime::BlockingRuntime;
pub use thematic::{
    GeopackageSchemaTemplate, SchemaPlan, SchemaTemplate, ThematicConverter, ThematicError,
    ThematicJob, ThematicState,
};
pub use tools::{Invocation, ProcessRunner, ToolError, ToolOutput, ToolPaths, ToolRunner};
