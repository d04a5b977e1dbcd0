//! Facade crate for the OSM export pipeline.
//!
//! This crate re-exports the core domain types and exposes the network,
//! subprocess and orchestration adapters behind the `pipeline` feature.

#![forbid(unsafe_code)]

pub use osm_export_core::{
    ArtefactRole, BoundingBox, CategorisedTag, ConfigurationError, ConversionResult,
    ExtractRequest, GeometryType, KeepRule, OverpassQuery, OverpassSettings, QueryBuilder, Stage,
    StagedFile, StagingLayout, build_query,
};

#[cfg(feature = "pipeline")]
pub use osm_export_data::{
    ExtractPipeline, ExtractReport, FileReference, FilterTemplate, HttpOverpassSource,
    OverpassFetcher, PipelineError, PipelineOptions, ProcessRunner, SchemaTemplate,
    ThematicConverter, ThematicError, ThematicJob, ToolPaths, ToolRunner,
};
