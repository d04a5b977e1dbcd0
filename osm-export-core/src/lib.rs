//! Core domain types for the OSM export pipeline.
//!
//! Responsibilities:
//! - Validate extraction inputs (bounding boxes, keep-rules, staging names).
//! - Render Overpass QL queries.
//! - Describe staged artefacts and per-stage results.
//!
//! Boundaries:
//! - No network, disk or subprocess I/O; adapters live in `osm-export-data`.
//!
//! Invariants:
//! - Constructors return `Result` so invalid input surfaces before any stage
//!   runs.

#![forbid(unsafe_code)]

mod bbox;
mod error;
pub mod query;
mod request;
mod result;
mod rules;
mod staging;
mod tags;

pub use bbox::BoundingBox;
pub use error::ConfigurationError;
pub use query::{
    DEFAULT_MAX_SIZE_BYTES, DEFAULT_TIMEOUT_SECONDS, OverpassQuery, QueryBuilder, build_query,
};
pub use request::{DEFAULT_OVERPASS_URL, DEFAULT_USER_AGENT, ExtractRequest, OverpassSettings};
pub use result::{ConversionResult, Stage, error_chain};
pub use rules::KeepRule;
pub use staging::{ArtefactRole, StagedFile, StagingLayout, archive_path_for};
pub use tags::{CategorisedTag, GeometryType};
