//! Thematic geo-package to shapefile conversion.
//!
//! [`ThematicConverter`] runs three ordered stages over a working copy of the
//! geo-package: schema generation (per-theme tables plus spatial indexes),
//! shapefile conversion, and flattened zip archival. Each stage is callable
//! on its own and idempotent with respect to its declared output path.

mod error;
mod schema;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use osm_export_core::{
    CategorisedTag, ConfigurationError, ConversionResult, Stage, StagedFile, StagingLayout,
    archive_path_for,
};
use osm_export_fs::PathPresence;

pub use error::ThematicError;
pub use schema::{
    GeopackageSchemaTemplate, OTHER_TAGS_COLUMN, SchemaPlan, SchemaTemplate, SourceLayer,
    ThemeTable, quote_identifier, quote_literal, read_layers,
};

use crate::tools::{Invocation, ToolPaths, ToolRunner};

/// Inputs of one thematic conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThematicJob {
    geopackage: Utf8PathBuf,
    shapefile: Utf8PathBuf,
    layout: StagingLayout,
    tags: Vec<CategorisedTag>,
    zipped: bool,
}

impl ThematicJob {
    /// Convert `geopackage` into the shapefile directory `shapefile`, staging
    /// intermediates in `layout`.
    pub fn new(
        geopackage: impl Into<Utf8PathBuf>,
        shapefile: impl Into<Utf8PathBuf>,
        layout: StagingLayout,
    ) -> Self {
        Self {
            geopackage: geopackage.into(),
            shapefile: shapefile.into(),
            layout,
            tags: Vec::new(),
            zipped: false,
        }
    }

    /// Categorised tags defining the themes.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = CategorisedTag>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    /// Whether [`ThematicConverter::run`] archives the shapefiles.
    #[must_use]
    pub const fn with_zipped(mut self, zipped: bool) -> Self {
        self.zipped = zipped;
        self
    }

    /// Source geo-package.
    #[must_use]
    pub fn geopackage(&self) -> &Utf8Path {
        &self.geopackage
    }

    /// Shapefile output directory.
    #[must_use]
    pub fn shapefile(&self) -> &Utf8Path {
        &self.shapefile
    }

    /// `<shapefile>.zip`.
    #[must_use]
    pub fn archive(&self) -> Utf8PathBuf {
        archive_path_for(&self.shapefile)
    }

    /// Staging layout.
    #[must_use]
    pub const fn layout(&self) -> &StagingLayout {
        &self.layout
    }

    /// Categorised tags.
    #[must_use]
    pub fn tags(&self) -> &[CategorisedTag] {
        &self.tags
    }

    /// Whether archival is part of [`ThematicConverter::run`].
    #[must_use]
    pub const fn zipped(&self) -> bool {
        self.zipped
    }
}

/// Progress of a [`ThematicConverter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThematicState {
    /// Constructed; no stage has run.
    Pending,
    /// Theme tables and spatial indexes exist in the working copy.
    SchemaWritten,
    /// Shapefiles exist.
    Converted,
    /// The shapefiles were archived and their directory removed.
    Archived,
    /// The named stage failed.
    Failed(Stage),
}

/// Runs schema generation, shapefile conversion and archival for one job.
pub struct ThematicConverter<R> {
    runner: R,
    tools: ToolPaths,
    job: ThematicJob,
    working: StagedFile,
    template: Box<dyn SchemaTemplate>,
    timeout: Option<Duration>,
    layers: Vec<String>,
    state: ThematicState,
}

impl<R> std::fmt::Debug for ThematicConverter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThematicConverter")
            .field("tools", &self.tools)
            .field("job", &self.job)
            .field("working", &self.working)
            .field("layers", &self.layers)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<R: ToolRunner> ThematicConverter<R> {
    /// Validate `job` and copy its geo-package into the staging directory.
    ///
    /// # Errors
    ///
    /// Returns [`ThematicError::Configuration`] when the geo-package is
    /// missing or not a file, or when the shapefile's parent directory or the
    /// staging directory is missing. Returns [`ThematicError::Copy`] when the
    /// working copy cannot be made.
    pub fn new(job: ThematicJob, runner: R, tools: ToolPaths) -> Result<Self, ThematicError> {
        match inspect(job.geopackage())? {
            PathPresence::File { .. } => {}
            PathPresence::Absent => {
                return Err(ConfigurationError::MissingInput {
                    path: job.geopackage.clone(),
                }
                .into());
            }
            PathPresence::Directory | PathPresence::Other => {
                return Err(ConfigurationError::UnexpectedInputKind {
                    path: job.geopackage.clone(),
                    expected: "file",
                }
                .into());
            }
        }
        let working = job.layout.thematic_geopackage();
        require_parent(job.shapefile())?;
        require_parent(working.path())?;

        osm_export_fs::copy_file(job.geopackage(), working.path()).map_err(|source| {
            ThematicError::Copy {
                from: job.geopackage.clone(),
                to: working.path().to_path_buf(),
                source,
            }
        })?;
        Ok(Self {
            runner,
            tools,
            job,
            working,
            template: Box::new(GeopackageSchemaTemplate),
            timeout: None,
            layers: Vec::new(),
            state: ThematicState::Pending,
        })
    }

    /// Replace the schema script dialect.
    #[must_use]
    pub fn with_template(mut self, template: Box<dyn SchemaTemplate>) -> Self {
        self.template = template;
        self
    }

    /// Bound each subprocess.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ThematicState {
        self.state
    }

    /// The job being converted.
    #[must_use]
    pub const fn job(&self) -> &ThematicJob {
        &self.job
    }

    /// Working copy of the geo-package.
    #[must_use]
    pub const fn working_geopackage(&self) -> &StagedFile {
        &self.working
    }

    /// Theme tables created by the last schema run.
    #[must_use]
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Create one table per theme and geometry family in the working copy,
    /// each with a spatial index.
    ///
    /// The script is written to the staging directory, piped into the
    /// spatial SQL shell and removed whatever the outcome. With no tags the
    /// script is an empty transaction and the shell still runs once.
    ///
    /// # Errors
    ///
    /// Returns [`ThematicError::SchemaGeneration`] when the shell fails, and
    /// introspection or script I/O errors otherwise.
    pub fn generate_thematic_schema(&mut self) -> Result<&StagedFile, ThematicError> {
        let outcome = self.write_schema();
        self.state = match &outcome {
            Ok(tables) => {
                self.layers.clone_from(tables);
                ThematicState::SchemaWritten
            }
            Err(_) => ThematicState::Failed(Stage::Schema),
        };
        outcome.map(|_| &self.working)
    }

    fn write_schema(&self) -> Result<Vec<String>, ThematicError> {
        let plan = if self.job.tags.is_empty() {
            SchemaPlan::default()
        } else {
            let layers =
                read_layers(self.working.path()).map_err(|source| ThematicError::Geopackage {
                    path: self.working.path().to_path_buf(),
                    source,
                })?;
            SchemaPlan::build(&self.job.tags, &layers)?
        };
        let script = self.job.layout.schema_script();
        let _guard = ScratchFile(script.path());
        osm_export_fs::write_file(script.path(), self.template.render(&plan)).map_err(
            |source| ThematicError::Script {
                path: script.path().to_path_buf(),
                source,
            },
        )?;

        let invocation = Invocation::new(self.tools.spatialite.as_str())
            .arg(self.working.path().as_str())
            .stdin_from(script.path())
            .with_timeout(self.timeout);
        self.runner
            .run(&invocation)
            .map_err(|source| ThematicError::SchemaGeneration { source })?;
        info!(
            "wrote {} theme tables to {}",
            plan.tables().len(),
            self.working.path()
        );
        Ok(plan.table_names())
    }

    /// Convert the working geo-package into the shapefile directory with
    /// UTF-8 attributes, overwriting existing layers.
    ///
    /// Only the theme tables are exported once the schema stage has produced
    /// some; otherwise every layer is. A failed conversion removes the
    /// partial directory.
    ///
    /// # Errors
    ///
    /// Returns [`ThematicError::Conversion`] when the converter fails.
    pub fn convert(&mut self) -> Result<Utf8PathBuf, ThematicError> {
        let shapefile = self.job.shapefile.clone();
        let invocation = Invocation::new(self.tools.ogr2ogr.as_str())
            .args(["-f", "ESRI Shapefile"])
            .arg(shapefile.as_str())
            .arg(self.working.path().as_str())
            .args(["-lco", "ENCODING=UTF-8", "-overwrite"])
            .args(self.layers.iter().cloned())
            .with_timeout(self.timeout);
        if let Err(source) = self.runner.run(&invocation) {
            self.state = ThematicState::Failed(Stage::Convert);
            if let Err(err) = osm_export_fs::remove_dir_all_if_exists(&shapefile) {
                warn!("failed to remove partial shapefile directory {shapefile}: {err}");
            }
            return Err(ThematicError::Conversion { source });
        }
        self.state = ThematicState::Converted;
        Ok(shapefile)
    }

    /// Zip the shapefile directory's files without their directory structure
    /// into `<shapefile>.zip`, then remove the directory.
    ///
    /// When the directory is already gone but the archive exists, a previous
    /// call succeeded and the archive is returned unchanged. Failure to
    /// remove the directory afterwards is logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`ThematicError::Archive`] when the archiver fails and
    /// [`ThematicError::MissingShapefileDirectory`] when there is nothing to
    /// archive.
    pub fn archive(&mut self) -> Result<Utf8PathBuf, ThematicError> {
        let outcome = self.write_archive();
        self.state = if outcome.is_ok() {
            ThematicState::Archived
        } else {
            ThematicState::Failed(Stage::Archive)
        };
        outcome
    }

    fn write_archive(&self) -> Result<Utf8PathBuf, ThematicError> {
        let shapefile = self.job.shapefile();
        let archive = self.job.archive();
        if !inspect(shapefile)?.is_dir() {
            if inspect(&archive)?.is_file() {
                warn!("{shapefile} already archived to {archive}");
                return Ok(archive);
            }
            return Err(ThematicError::MissingShapefileDirectory {
                path: shapefile.to_path_buf(),
            });
        }

        osm_export_fs::remove_file_if_exists(&archive).map_err(|source| {
            ThematicError::ClearArchive {
                path: archive.clone(),
                source,
            }
        })?;
        let invocation = Invocation::new(self.tools.zip.as_str())
            .args(["-j", "-r"])
            .arg(archive.as_str())
            .arg(shapefile.as_str())
            .with_timeout(self.timeout);
        if let Err(source) = self.runner.run(&invocation) {
            if let Err(err) = osm_export_fs::remove_file_if_exists(&archive) {
                warn!("failed to remove partial archive {archive}: {err}");
            }
            return Err(ThematicError::Archive { source });
        }
        if let Err(err) = osm_export_fs::remove_dir_all_if_exists(shapefile) {
            warn!("archived {shapefile} but failed to remove it: {err}");
        }
        info!("archived {shapefile} to {archive}");
        Ok(archive)
    }

    /// Run schema generation, conversion and, when the job is zipped,
    /// archival, stopping at the first failure.
    pub fn run(&mut self) -> Vec<ConversionResult> {
        let mut results = Vec::with_capacity(3);

        let schema = self.generate_thematic_schema().map(|_| ());
        let schema_ok = schema.is_ok();
        results.push(ConversionResult::from_outcome(
            Stage::Schema,
            self.working.path(),
            &schema,
        ));
        if !schema_ok {
            return results;
        }

        let converted = self.convert();
        results.push(ConversionResult::from_outcome(
            Stage::Convert,
            self.job.shapefile(),
            &converted,
        ));
        if converted.is_err() || !self.job.zipped {
            return results;
        }

        let archived = self.archive();
        results.push(ConversionResult::from_outcome(
            Stage::Archive,
            &self.job.archive(),
            &archived,
        ));
        results
    }
}

fn inspect(path: &Utf8Path) -> Result<PathPresence, ConfigurationError> {
    osm_export_fs::inspect(path).map_err(|err| ConfigurationError::InspectPath {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn require_parent(path: &Utf8Path) -> Result<(), ConfigurationError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    if inspect(parent)?.is_dir() {
        Ok(())
    } else {
        Err(ConfigurationError::MissingParentDirectory {
            path: path.to_path_buf(),
        })
    }
}

/// Removes a transient file when dropped.
struct ScratchFile<'a>(&'a Utf8Path);

impl Drop for ScratchFile<'_> {
    fn drop(&mut self) {
        if let Err(err) = osm_export_fs::remove_file_if_exists(self.0) {
            warn!("failed to remove {}: {err}", self.0);
        }
    }
}

#[cfg(test)]
mod tests;
