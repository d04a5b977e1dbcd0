//! Staging directory layout and staged artefacts.
//!
//! Each run owns exactly one staging directory, keyed by its run identifier.
//! Every intermediate and final artefact of the run lives under it, so two
//! concurrent runs never share a path.

use camino::{Utf8Path, Utf8PathBuf};

use crate::ConfigurationError;

/// Logical role of a file produced by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "kebab-case")
)]
pub enum ArtefactRole {
    /// Raw Overpass XML response.
    Raw,
    /// Compact binary (o5m) copy of the raw extract.
    Binary,
    /// Tag-filtered OSM XML.
    Filtered,
    /// Transient keep-rule parameter file.
    FilterParameters,
    /// Transient thematic SQL script.
    SchemaScript,
    /// Geo-package holding the per-theme tables.
    ThematicGeopackage,
    /// Directory of per-theme shapefiles.
    ShapefileDirectory,
    /// Final zip archive.
    Archive,
}

/// A file or directory created by one stage, tagged with its role.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StagedFile {
    path: Utf8PathBuf,
    role: ArtefactRole,
}

impl StagedFile {
    /// Pair a path with its role.
    pub fn new(path: impl Into<Utf8PathBuf>, role: ArtefactRole) -> Self {
        Self {
            path: path.into(),
            role,
        }
    }

    /// Location on disk.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Logical role.
    #[must_use]
    pub const fn role(&self) -> ArtefactRole {
        self.role
    }

    /// Consume the wrapper and return the path.
    #[must_use]
    pub fn into_path(self) -> Utf8PathBuf {
        self.path
    }
}

/// File names used inside one run's staging directory.
///
/// # Examples
/// ```
/// use osm_export_core::StagingLayout;
///
/// # fn main() -> Result<(), osm_export_core::ConfigurationError> {
/// let layout = StagingLayout::for_run("/srv/staging", "7c1d", "kathmandu")?;
/// assert_eq!(layout.raw_osm().path(), "/srv/staging/7c1d/query.osm");
/// assert_eq!(layout.filtered_osm().path(), "/srv/staging/7c1d/kathmandu.osm");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    directory: Utf8PathBuf,
    job_name: String,
}

impl StagingLayout {
    /// Use `directory` as the staging directory for `job_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidJobName`] when the job name is
    /// empty or would escape the staging directory.
    pub fn new(
        directory: impl Into<Utf8PathBuf>,
        job_name: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let name = job_name.into();
        if !is_single_segment(&name) {
            return Err(ConfigurationError::InvalidJobName { name });
        }
        Ok(Self {
            directory: directory.into(),
            job_name: name,
        })
    }

    /// Derive the staging directory `root/<run_id>` for one run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when the run identifier or job name is
    /// not a single path segment.
    pub fn for_run(
        root: impl AsRef<Utf8Path>,
        run_id: &str,
        job_name: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        if !is_single_segment(run_id) {
            return Err(ConfigurationError::InvalidRunId {
                run_id: run_id.to_owned(),
            });
        }
        Self::new(root.as_ref().join(run_id), job_name)
    }

    /// Staging directory owned by the run.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    /// Job name used to derive file names.
    #[must_use]
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// `query.osm`, the raw Overpass response.
    #[must_use]
    pub fn raw_osm(&self) -> StagedFile {
        self.staged("query.osm", ArtefactRole::Raw)
    }

    /// `query.o5m`, the compact copy of the raw response.
    #[must_use]
    pub fn compact_osm(&self) -> StagedFile {
        self.staged("query.o5m", ArtefactRole::Binary)
    }

    /// `<job>.osm`, the filtered extract.
    #[must_use]
    pub fn filtered_osm(&self) -> StagedFile {
        self.staged(&format!("{}.osm", self.job_name), ArtefactRole::Filtered)
    }

    /// `filters.txt`, the transient keep-rule parameter file.
    #[must_use]
    pub fn filter_parameters(&self) -> StagedFile {
        self.staged("filters.txt", ArtefactRole::FilterParameters)
    }

    /// `thematic_spatial_index.sql`, the transient schema script.
    #[must_use]
    pub fn schema_script(&self) -> StagedFile {
        self.staged("thematic_spatial_index.sql", ArtefactRole::SchemaScript)
    }

    /// `<job>_thematic.gpkg`, the working copy of the geo-package.
    #[must_use]
    pub fn thematic_geopackage(&self) -> StagedFile {
        self.staged(
            &format!("{}_thematic.gpkg", self.job_name),
            ArtefactRole::ThematicGeopackage,
        )
    }

    fn staged(&self, file_name: &str, role: ArtefactRole) -> StagedFile {
        StagedFile::new(self.directory.join(file_name), role)
    }
}

/// Archive path for a shapefile directory: `<base>.zip` next to it.
#[must_use]
pub fn archive_path_for(shapefile_base: &Utf8Path) -> Utf8PathBuf {
    let mut raw = shapefile_base.as_str().trim_end_matches('/').to_owned();
    raw.push_str(".zip");
    Utf8PathBuf::from(raw)
}

fn is_single_segment(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\'])
        && !value.contains('\0')
}
