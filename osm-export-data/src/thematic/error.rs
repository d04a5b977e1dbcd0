//! Errors raised by the thematic conversion stages.

use std::io;

use camino::Utf8PathBuf;
use osm_export_core::ConfigurationError;
use thiserror::Error;

use crate::tools::ToolError;

/// Failure of a [`ThematicConverter`](super::ThematicConverter) stage.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ThematicError {
    /// The job was mis-configured; detected before any stage ran.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Copying the source geo-package into the staging directory failed.
    #[error("failed to copy geo-package {from} to {to}: {source}")]
    Copy {
        /// Source geo-package.
        from: Utf8PathBuf,
        /// Working copy path.
        to: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The working geo-package could not be introspected.
    #[error("failed to read layers of geo-package {path}: {source}")]
    Geopackage {
        /// Working copy path.
        path: Utf8PathBuf,
        /// Underlying `SQLite` error.
        #[source]
        source: rusqlite::Error,
    },
    /// Writing the transient schema script failed.
    #[error("failed to write schema script {path}: {source}")]
    Script {
        /// Script path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The spatial SQL shell failed.
    #[error("schema generation failed: {source}")]
    SchemaGeneration {
        /// Tool failure, including captured stderr.
        #[source]
        source: ToolError,
    },
    /// Shapefile conversion failed.
    #[error("shapefile conversion failed: {source}")]
    Conversion {
        /// Tool failure, including captured stderr.
        #[source]
        source: ToolError,
    },
    /// Archiving failed.
    #[error("archiving failed: {source}")]
    Archive {
        /// Tool failure, including captured stderr.
        #[source]
        source: ToolError,
    },
    /// Neither the shapefile directory nor a previous archive exists.
    #[error("shapefile directory {path} does not exist and no archive was found")]
    MissingShapefileDirectory {
        /// Expected shapefile directory.
        path: Utf8PathBuf,
    },
    /// A stale archive could not be removed before re-archiving.
    #[error("failed to remove stale archive {path}: {source}")]
    ClearArchive {
        /// Archive path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl ThematicError {
    /// Underlying tool failure, if any.
    #[must_use]
    pub const fn tool_error(&self) -> Option<&ToolError> {
        match self {
            Self::SchemaGeneration { source }
            | Self::Conversion { source }
            | Self::Archive { source } => Some(source),
            _ => None,
        }
    }
}
