//! Error types produced while fetching Overpass extracts.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Transport-level errors encountered while talking to the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The interpreter answered with a non-2xx status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Interpreter endpoint.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The connection failed or the body could not be streamed.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Interpreter endpoint.
        url: String,
        /// I/O error reported by the transport.
        #[source]
        source: io::Error,
    },
    /// The request exceeded the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Interpreter endpoint.
        url: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },
}

/// Errors returned by [`OverpassFetcher`](super::OverpassFetcher).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The HTTP client could not be configured.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// Builder error from `reqwest`.
        #[source]
        source: reqwest::Error,
    },
    /// The blocking runtime could not start or cannot block here.
    #[error("fetch runtime unavailable: {source}")]
    Runtime {
        /// Error reported by Tokio.
        #[source]
        source: io::Error,
    },
    /// The staging file could not be prepared or written.
    #[error("failed to write Overpass response to {path}: {source}")]
    Staging {
        /// File being written.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The interpreter request failed; a partial download may remain at
    /// `partial_path` for diagnostics.
    #[error("Overpass query failed (partial output kept at {partial_path}): {source}")]
    Transport {
        /// Partial download left in place.
        partial_path: Utf8PathBuf,
        /// Transport failure.
        #[source]
        source: TransportError,
    },
}

impl FetchError {
    /// Whether the failure was a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                source: TransportError::Timeout { .. },
                ..
            }
        )
    }
}
