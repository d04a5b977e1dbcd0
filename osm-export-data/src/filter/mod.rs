//! Local keep-rule filtering of raw Overpass extracts.
//!
//! Filtering runs in two steps: the raw XML is first
//! converted to the compact o5m form, which `osmfilter` then reduces to the
//! features matching the job's keep-rules.

mod error;
mod template;

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use log::{error, warn};
use osm_export_core::{ArtefactRole, KeepRule, StagedFile, StagingLayout};

pub use error::FilterError;
pub use template::{FilterTemplate, OsmfilterTemplate};

use crate::tools::{Invocation, ToolRunner};

/// Wraps `osmconvert` to translate OSM XML into o5m.
#[derive(Debug, Clone)]
pub struct FormatConverter<R> {
    runner: R,
    program: String,
    timeout: Option<Duration>,
}

impl<R: ToolRunner> FormatConverter<R> {
    /// Use `program` (normally `osmconvert`) through `runner`.
    pub fn new(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout: None,
        }
    }

    /// Bound each conversion.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Convert `raw` into the o5m file at `destination`.
    ///
    /// On failure the destination is removed so no truncated output survives.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Conversion`] carrying the tool error, including
    /// captured stderr on a non-zero exit.
    pub fn convert_to_compact(
        &self,
        raw: &Utf8Path,
        destination: &Utf8Path,
    ) -> Result<StagedFile, FilterError> {
        let invocation = Invocation::new(self.program.as_str())
            .arg(raw.as_str())
            .arg(format!("-o={destination}"))
            .with_timeout(self.timeout);
        if let Err(source) = self.runner.run(&invocation) {
            discard_output(destination);
            return Err(FilterError::Conversion {
                raw: raw.to_path_buf(),
                source,
            });
        }
        Ok(StagedFile::new(destination, ArtefactRole::Binary))
    }
}

/// How the filtered output was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// `osmfilter` ran with the job's keep-rules.
    Filtered,
    /// No keep-rules were supplied; the raw extract was copied.
    NoRules,
    /// The parameter file could not be written; the raw extract was copied.
    ParameterFileUnavailable,
}

/// Result of [`TagFilter::filter_by_tags`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Filtered (or copied) extract at `<job>.osm`.
    pub filtered: StagedFile,
    /// Compact intermediate, when conversion ran.
    pub compact: Option<StagedFile>,
    /// How the output was produced.
    pub mode: FilterMode,
}

/// Wraps `osmfilter` to keep only features matching the job's keep-rules.
pub struct TagFilter<R> {
    runner: R,
    converter: FormatConverter<R>,
    program: String,
    layout: StagingLayout,
    template: Arc<dyn FilterTemplate>,
    timeout: Option<Duration>,
}

impl<R> std::fmt::Debug for TagFilter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagFilter")
            .field("program", &self.program)
            .field("layout", &self.layout)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<R: ToolRunner + Clone> TagFilter<R> {
    /// Filter inside `layout` using `osmconvert_program` and
    /// `osmfilter_program`.
    pub fn new(
        runner: R,
        osmconvert_program: impl Into<String>,
        osmfilter_program: impl Into<String>,
        layout: StagingLayout,
    ) -> Self {
        Self {
            converter: FormatConverter::new(runner.clone(), osmconvert_program),
            runner,
            program: osmfilter_program.into(),
            layout,
            template: Arc::new(OsmfilterTemplate),
            timeout: None,
        }
    }
}

impl<R: ToolRunner> TagFilter<R> {
    /// Replace the parameter-file syntax.
    #[must_use]
    pub fn with_template(mut self, template: Arc<dyn FilterTemplate>) -> Self {
        self.template = template;
        self
    }

    /// Bound each subprocess.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self.converter = self.converter.with_timeout(timeout);
        self
    }

    /// Reduce the raw extract at `raw` to features matching `rules`.
    ///
    /// An empty rule list means "keep everything": the raw extract is copied
    /// to `<job>.osm` and a warning is logged. When the parameter file cannot
    /// be written the raw extract is copied too, with an error logged.
    /// Otherwise the extract is converted to
    /// o5m and `osmfilter` runs exactly once. The parameter file is removed
    /// whatever the outcome, and any `<job>.osm` from an earlier attempt is
    /// removed before work starts.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Conversion`] or [`FilterError::Filter`] when a
    /// tool fails, and [`FilterError::Copy`] when a fallback copy fails.
    pub fn filter_by_tags(
        &self,
        raw: &Utf8Path,
        rules: &[KeepRule],
    ) -> Result<FilterOutcome, FilterError> {
        let filtered = self.layout.filtered_osm();
        discard_output(filtered.path());
        if rules.is_empty() {
            warn!("no filters found; returning raw OSM data for {raw}");
            return self.copy_raw(raw, filtered, FilterMode::NoRules);
        }

        let params = self.layout.filter_parameters();
        let contents = self.template.render(rules);
        let _params_guard = match osm_export_fs::write_file(params.path(), contents) {
            Ok(()) => ScratchFile(params.path()),
            Err(err) => {
                error!("error saving filter parameter file {}: {err}", params.path());
                discard_output(params.path());
                return self.copy_raw(raw, filtered, FilterMode::ParameterFileUnavailable);
            }
        };

        let compact = self
            .converter
            .convert_to_compact(raw, self.layout.compact_osm().path())?;
        let invocation = Invocation::new(self.program.as_str())
            .arg(compact.path().as_str())
            .arg(format!("--parameter-file={}", params.path()))
            .arg("--out-osm")
            .arg(format!("-o={}", filtered.path()))
            .with_timeout(self.timeout);
        if let Err(source) = self.runner.run(&invocation) {
            discard_output(filtered.path());
            return Err(FilterError::Filter {
                input: compact.into_path(),
                source,
            });
        }
        Ok(FilterOutcome {
            filtered,
            compact: Some(compact),
            mode: FilterMode::Filtered,
        })
    }

    fn copy_raw(
        &self,
        raw: &Utf8Path,
        filtered: StagedFile,
        mode: FilterMode,
    ) -> Result<FilterOutcome, FilterError> {
        if let Err(source) = osm_export_fs::copy_file(raw, filtered.path()) {
            discard_output(filtered.path());
            return Err(FilterError::Copy {
                from: raw.to_path_buf(),
                to: filtered.path().to_path_buf(),
                source,
            });
        }
        Ok(FilterOutcome {
            filtered,
            compact: None,
            mode,
        })
    }
}

/// Removes a transient file when dropped.
struct ScratchFile<'a>(&'a Utf8Path);

impl Drop for ScratchFile<'_> {
    fn drop(&mut self) {
        discard_output(self.0);
    }
}

fn discard_output(path: &Utf8Path) {
    if let Err(err) = osm_export_fs::remove_file_if_exists(path) {
        warn!("failed to remove {path}: {err}");
    }
}
