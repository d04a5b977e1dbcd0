//! Errors raised by the conversion and filter stages.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::tools::ToolError;

/// Failure of [`FormatConverter`](super::FormatConverter) or
/// [`TagFilter`](super::TagFilter).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FilterError {
    /// `osmconvert` failed.
    #[error("osmconvert failed for {raw}: {source}")]
    Conversion {
        /// Raw extract being converted.
        raw: Utf8PathBuf,
        /// Tool failure, including captured stderr.
        #[source]
        source: ToolError,
    },
    /// `osmfilter` failed.
    #[error("osmfilter failed for {input}: {source}")]
    Filter {
        /// Compact extract being filtered.
        input: Utf8PathBuf,
        /// Tool failure, including captured stderr.
        #[source]
        source: ToolError,
    },
    /// Copying the raw extract into place failed.
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        /// Raw extract.
        from: Utf8PathBuf,
        /// Filtered output path.
        to: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl FilterError {
    /// Underlying tool failure, if any.
    #[must_use]
    pub const fn tool_error(&self) -> Option<&ToolError> {
        match self {
            Self::Conversion { source, .. } | Self::Filter { source, .. } => Some(source),
            Self::Copy { .. } => None,
        }
    }
}
