//! Configuration errors raised while validating extraction inputs.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors caused by a mis-configured run.
///
/// These are never retryable without fixing the input: a caller receiving one
/// should surface it to whoever supplied the job configuration.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// The bounding box did not contain exactly four components.
    #[error("bounding box requires 4 comma-separated coordinates (miny,minx,maxy,maxx), found {found}")]
    MissingComponent {
        /// Number of components that were supplied.
        found: usize,
    },
    /// A bounding box component could not be parsed as a number.
    #[error("bounding box component {component} is not a number: {raw:?}")]
    InvalidCoordinate {
        /// Name of the offending component.
        component: &'static str,
        /// Raw text supplied for the component.
        raw: String,
    },
    /// A bounding box component was NaN or infinite.
    #[error("bounding box component {component} must be finite")]
    NonFiniteCoordinate {
        /// Name of the offending component.
        component: &'static str,
    },
    /// A bounding box component lies outside WGS84 bounds.
    #[error("bounding box component {component} = {value} is outside WGS84 bounds")]
    CoordinateOutOfRange {
        /// Name of the offending component.
        component: &'static str,
        /// Value that was rejected.
        value: f64,
    },
    /// The minimum of an axis was not strictly below its maximum.
    #[error("bounding box {axis} axis is inverted or empty: min {min} must be below max {max}")]
    InvertedBounds {
        /// Axis name, either `x` or `y`.
        axis: &'static str,
        /// Supplied minimum.
        min: f64,
        /// Supplied maximum.
        max: f64,
    },
    /// The job name cannot be used to derive staging file names.
    #[error("job name {name:?} must be non-empty and must not contain path separators")]
    InvalidJobName {
        /// Rejected job name.
        name: String,
    },
    /// The run identifier cannot be used as a staging directory name.
    #[error("run identifier {run_id:?} must be a single non-empty path segment")]
    InvalidRunId {
        /// Rejected run identifier.
        run_id: String,
    },
    /// A tag filter could not be interpreted as a keep-rule.
    #[error("tag filter {raw:?} is not a key=value or key:value rule")]
    InvalidKeepRule {
        /// Rejected filter text.
        raw: String,
    },
    /// A geometry type name was not recognised.
    #[error("unknown geometry type {raw:?} (expected point, line or polygon)")]
    UnknownGeometryType {
        /// Rejected geometry type text.
        raw: String,
    },
    /// A categorised tag named a theme that cannot become a table name.
    #[error("theme {theme:?} does not contain any alphanumeric characters")]
    InvalidTheme {
        /// Rejected theme name.
        theme: String,
    },
    /// The Overpass endpoint is not a valid absolute URL.
    #[error("Overpass endpoint {url:?} is not a valid URL: {source}")]
    InvalidEndpoint {
        /// Rejected endpoint text.
        url: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },
    /// A declared input path does not exist.
    #[error("input path {path} does not exist")]
    MissingInput {
        /// Path that was expected to exist.
        path: Utf8PathBuf,
    },
    /// A declared input path exists but has the wrong type.
    #[error("input path {path} is not a {expected}")]
    UnexpectedInputKind {
        /// Path that was inspected.
        path: Utf8PathBuf,
        /// Either `file` or `directory`.
        expected: &'static str,
    },
    /// A destination's parent directory does not exist.
    #[error("parent directory of destination {path} does not exist")]
    MissingParentDirectory {
        /// Destination whose parent is missing.
        path: Utf8PathBuf,
    },
    /// A declared path could not be inspected.
    #[error("failed to inspect {path}: {message}")]
    InspectPath {
        /// Path that was inspected.
        path: Utf8PathBuf,
        /// Rendered I/O error.
        message: String,
    },
}
