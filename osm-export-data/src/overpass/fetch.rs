use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use osm_export_core::{ArtefactRole, OverpassQuery, StagedFile};
use tokio::io::{AsyncWriteExt, BufWriter};

use super::{FetchError, OverpassSource};
use crate::BlockingRuntime;

/// Write buffer size for the streamed response (5 MiB).
pub const CHUNK_BYTES: usize = 5 * 1024 * 1024;

/// Outcome of a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Raw extract written to the staging directory.
    pub staged: StagedFile,
    /// Bytes received from the interpreter.
    pub bytes_written: u64,
}

/// Executes Overpass queries and streams the response to a staging file.
///
/// The response is written to `<destination>.part` and renamed into place
/// only after the body has been fully received, so a truncated download is
/// never found at the destination. Failures are not retried.
///
/// # Examples
/// ```
/// use camino::Utf8PathBuf;
/// use osm_export_core::OverpassQuery;
/// use osm_export_data::overpass::{OverpassFetcher, test_support::StubOverpassSource};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let temp = tempfile::tempdir()?;
/// let destination = Utf8PathBuf::from_path_buf(temp.path().join("query.osm"))
///     .map_err(|_| "non-UTF-8 temp dir")?;
/// let fetcher = OverpassFetcher::new(StubOverpassSource::with_body(b"<osm/>".to_vec()))?;
/// let report = fetcher.fetch(&OverpassQuery::new("out body;"), &destination)?;
/// assert_eq!(report.bytes_written, 6);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OverpassFetcher<S> {
    source: S,
    runtime: BlockingRuntime,
}

impl<S: OverpassSource> OverpassFetcher<S> {
    /// Wrap `source` with an owned blocking runtime.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Runtime`] when the runtime cannot start.
    pub fn new(source: S) -> Result<Self, FetchError> {
        let runtime = BlockingRuntime::new().map_err(|source| FetchError::Runtime { source })?;
        Ok(Self { source, runtime })
    }

    /// Underlying source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Blocking form of [`Self::fetch_async`].
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_async`]. Also returns [`FetchError::Runtime`] when
    /// called from inside a `current_thread` Tokio runtime.
    pub fn fetch(
        &self,
        query: &OverpassQuery,
        destination: &Utf8Path,
    ) -> Result<FetchReport, FetchError> {
        self.runtime
            .block_on(self.fetch_async(query, destination))
            .map_err(|source| FetchError::Runtime { source })?
    }

    /// Execute `query` and stream the response to `destination`.
    ///
    /// Any stale file at `destination` is removed first, so a failed fetch
    /// never leaves an older extract behind for later stages to consume.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] for connection failures, timeouts and
    /// non-2xx responses, and [`FetchError::Staging`] when the staging file
    /// cannot be written.
    pub async fn fetch_async(
        &self,
        query: &OverpassQuery,
        destination: &Utf8Path,
    ) -> Result<FetchReport, FetchError> {
        let partial = partial_path(destination);
        debug!("Overpass query: {query}");
        info!(
            "fetching Overpass extract from {} into {destination}",
            self.source.endpoint()
        );

        osm_export_fs::remove_file_if_exists(destination).map_err(|source| {
            FetchError::Staging {
                path: destination.to_path_buf(),
                source,
            }
        })?;
        let file = osm_export_fs::create_file(&partial).map_err(|source| FetchError::Staging {
            path: partial.clone(),
            source,
        })?;
        let mut writer = BufWriter::with_capacity(CHUNK_BYTES, tokio::fs::File::from_std(file));

        let bytes_written = match self.source.post_query(query, &mut writer).await {
            Ok(bytes) => bytes,
            Err(source) => {
                // Keep whatever arrived for diagnostics.
                let _flushed = writer.flush().await;
                return Err(FetchError::Transport {
                    partial_path: partial,
                    source,
                });
            }
        };
        writer
            .flush()
            .await
            .map_err(|source| FetchError::Staging {
                path: partial.clone(),
                source,
            })?;
        drop(writer);

        osm_export_fs::rename(&partial, destination).map_err(|source| FetchError::Staging {
            path: destination.to_path_buf(),
            source,
        })?;
        info!("wrote {bytes_written} bytes of Overpass output to {destination}");
        Ok(FetchReport {
            staged: StagedFile::new(destination, ArtefactRole::Raw),
            bytes_written,
        })
    }
}

fn partial_path(destination: &Utf8Path) -> Utf8PathBuf {
    let mut raw = destination.as_str().to_owned();
    raw.push_str(".part");
    Utf8PathBuf::from(raw)
}
