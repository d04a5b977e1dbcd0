//! References to finished export files, local or remote.

use std::{fmt, io};

use camino::{Utf8Path, Utf8PathBuf};
use osm_export_core::ConfigurationError;
use serde::Serialize;
use url::Url;

/// Where a finished export file lives.
///
/// The variant is decided once, when the reference is parsed; callers never
/// sniff strings afterwards.
///
/// # Examples
/// ```
/// use osm_export_data::FileReference;
///
/// # fn main() -> Result<(), osm_export_core::ConfigurationError> {
/// let remote = FileReference::parse("https://exports.example.org/d/kathmandu_2024_thematic_shp.zip")?;
/// assert!(remote.is_remote());
/// assert_eq!(remote.download_name().as_deref(), Some("kathmandu_shp.zip"));
///
/// let local = FileReference::parse("/srv/staging/run/kathmandu.osm")?;
/// assert_eq!(local.download_name().as_deref(), Some("kathmandu.osm"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "lowercase")]
pub enum FileReference {
    /// Served over HTTP(S).
    Remote(Url),
    /// On the local filesystem.
    Local(Utf8PathBuf),
}

impl FileReference {
    /// Classify `raw` as a remote URL (`http`/`https`) or a local path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingInput`] for an empty reference and
    /// [`ConfigurationError::InvalidEndpoint`] for an `http(s)` reference
    /// that does not parse.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConfigurationError::MissingInput {
                path: Utf8PathBuf::new(),
            });
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Url::parse(trimmed).map(Self::Remote).map_err(|source| {
                ConfigurationError::InvalidEndpoint {
                    url: trimmed.to_owned(),
                    source,
                }
            });
        }
        Ok(Self::Local(Utf8PathBuf::from(trimmed)))
    }

    /// Whether the file is served remotely.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Local path, when the file is local.
    #[must_use]
    pub fn as_local(&self) -> Option<&Utf8Path> {
        match self {
            Self::Local(path) => Some(path),
            Self::Remote(_) => None,
        }
    }

    /// Final path segment of the reference.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Self::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|segment| !segment.is_empty()),
            Self::Local(path) => path.file_name(),
        }
    }

    /// Name offered to users downloading the file.
    ///
    /// Remote names keep the first and last `_`-separated parts of the final
    /// segment, dropping generated infixes; local names are the file name.
    #[must_use]
    pub fn download_name(&self) -> Option<String> {
        let name = self.file_name()?;
        match self {
            Self::Local(_) => Some(name.to_owned()),
            Self::Remote(_) => {
                let mut parts = name.split('_');
                let first = parts.next()?;
                Some(parts.next_back().map_or_else(
                    || first.to_owned(),
                    |last| format!("{first}_{last}"),
                ))
            }
        }
    }

    /// Size of the file in bytes, `None` when it cannot be found.
    ///
    /// Local files are measured directly; relative paths are resolved
    /// against `download_root`. Remote files are sized from the
    /// `<download_root>/<name>_size.txt` sidecar written next to the
    /// published file, where `<name>` is the full final URL segment.
    ///
    /// # Errors
    ///
    /// Returns I/O errors other than absence, and
    /// [`io::ErrorKind::InvalidData`] for a malformed sidecar.
    pub fn resolve_size(&self, download_root: &Utf8Path) -> io::Result<Option<u64>> {
        match self {
            Self::Local(path) => {
                let absolute = if path.is_absolute() {
                    path.clone()
                } else {
                    download_root.join(path)
                };
                match osm_export_fs::inspect(&absolute)? {
                    osm_export_fs::PathPresence::File { len } => Ok(Some(len)),
                    _ => Ok(None),
                }
            }
            Self::Remote(_) => {
                let Some(name) = self.file_name() else {
                    return Ok(None);
                };
                let sidecar = download_root.join(format!("{name}_size.txt"));
                if !osm_export_fs::inspect(&sidecar)?.is_file() {
                    return Ok(None);
                }
                let contents = osm_export_fs::read_to_string(&sidecar)?;
                contents.trim().parse::<u64>().map(Some).map_err(|err| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("malformed size sidecar {sidecar}: {err}"),
                    )
                })
            }
        }
    }
}

impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url.as_str()),
            Self::Local(path) => f.write_str(path.as_str()),
        }
    }
}

impl From<Utf8PathBuf> for FileReference {
    fn from(path: Utf8PathBuf) -> Self {
        Self::Local(path)
    }
}

impl From<Url> for FileReference {
    fn from(url: Url) -> Self {
        Self::Remote(url)
    }
}
