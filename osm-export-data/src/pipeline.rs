//! End-to-end extract orchestration: query, fetch, convert and filter.
//!
//! Stages run strictly in order on the calling thread; each stage's output
//! is the next stage's input. Every stage that runs yields a
//! [`ConversionResult`] so the caller can persist progress without the
//! pipeline touching any database.

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use osm_export_core::{ConversionResult, ExtractRequest, Stage, StagedFile, error_chain};
use serde::Serialize;
use thiserror::Error;

use crate::filter::{FilterError, FilterOutcome, FilterTemplate, OsmfilterTemplate, TagFilter};
use crate::overpass::{FetchError, OverpassFetcher, OverpassSource};
use crate::tools::{ProcessRunner, ToolError, ToolPaths, ToolRunner};
use crate::FileReference;

/// Run-wide switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Log captured subprocess output.
    pub debug: bool,
    /// Bound for each external tool; `None` waits indefinitely.
    pub subprocess_timeout: Option<Duration>,
    /// Keep `query.osm` and `query.o5m` after filtering.
    pub retain_intermediates: bool,
}

/// Errors that abort an extract run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The staging directory could not be created.
    #[error("failed to create staging directory {path}: {source}")]
    Staging {
        /// Staging directory.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The Overpass download failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Conversion or filtering failed.
    #[error(transparent)]
    Filter(#[from] FilterError),
    /// The tool runner could not start.
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// Filtering reported success but left no output.
    #[error("filtered output {path} is missing")]
    MissingOutput {
        /// Expected output path.
        path: Utf8PathBuf,
    },
}

/// Outcome of [`ExtractPipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    /// Job name of the request.
    pub job_name: String,
    /// Overpass QL sent to the interpreter.
    pub query: String,
    /// One result per stage that ran, in order.
    pub stages: Vec<ConversionResult>,
    /// Filtered extract, when the run succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<FileReference>,
    /// Size of the filtered extract in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<u64>,
    /// Whether the run produced its output.
    pub succeeded: bool,
    /// Error chain of a failure outside any stage, or of the failed stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractReport {
    /// Result of `stage`, when it ran.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&ConversionResult> {
        self.stages.iter().find(|result| result.stage == stage)
    }
}

/// Composes query construction, the Overpass download and tag filtering.
///
/// # Examples
/// ```no_run
/// use osm_export_core::{BoundingBox, ExtractRequest, OverpassSettings, StagingLayout};
/// use osm_export_data::{ExtractPipeline, HttpOverpassSource, PipelineOptions, ToolPaths};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = OverpassSettings::default();
/// let request = ExtractRequest::new(
///     "27.6,85.2,27.8,85.4".parse::<BoundingBox>()?,
///     StagingLayout::for_run("/srv/staging", "run-1", "kathmandu")?,
///     ["highway=primary"],
///     settings.clone(),
/// )?;
/// let pipeline = ExtractPipeline::with_process_runner(
///     HttpOverpassSource::new(settings)?,
///     ToolPaths::default(),
///     PipelineOptions::default(),
/// )?;
/// let report = pipeline.run(&request);
/// println!("{}", serde_json::to_string_pretty(&report)?);
/// # Ok(())
/// # }
/// ```
pub struct ExtractPipeline<S, R> {
    fetcher: OverpassFetcher<S>,
    runner: R,
    tools: ToolPaths,
    options: PipelineOptions,
    template: Arc<dyn FilterTemplate>,
}

impl<S, R> std::fmt::Debug for ExtractPipeline<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractPipeline")
            .field("tools", &self.tools)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<S: OverpassSource> ExtractPipeline<S, ProcessRunner> {
    /// Run tools as real subprocesses, honouring the options' timeout and
    /// debug flag.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when either blocking runtime cannot start.
    pub fn with_process_runner(
        source: S,
        tools: ToolPaths,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        let runner = ProcessRunner::new()?
            .with_default_timeout(options.subprocess_timeout)
            .with_debug(options.debug);
        Self::new(source, runner, tools, options)
    }
}

impl<S: OverpassSource, R: ToolRunner> ExtractPipeline<S, R> {
    /// Compose a pipeline from its collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Fetch`] when the fetch runtime cannot start.
    pub fn new(
        source: S,
        runner: R,
        tools: ToolPaths,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            fetcher: OverpassFetcher::new(source)?,
            runner,
            tools,
            options,
            template: Arc::new(OsmfilterTemplate),
        })
    }

    /// Replace the filter parameter-file syntax.
    #[must_use]
    pub fn with_template(mut self, template: Arc<dyn FilterTemplate>) -> Self {
        self.template = template;
        self
    }

    /// Options in effect.
    #[must_use]
    pub const fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run every stage, capturing failures in the report rather than
    /// returning them.
    pub fn run(&self, request: &ExtractRequest) -> ExtractReport {
        let mut stages = Vec::new();
        let outcome = self.execute(request, &mut stages);
        let mut report = ExtractReport {
            job_name: request.job_name().to_owned(),
            query: request.query().into_inner(),
            stages,
            output: None,
            output_bytes: None,
            succeeded: false,
            error: None,
        };
        match outcome {
            Ok(filtered) => {
                let reference = FileReference::Local(filtered.into_path());
                report.output_bytes = reference
                    .resolve_size(request.staging().directory())
                    .unwrap_or_else(|err| {
                        warn!("failed to size {reference}: {err}");
                        None
                    });
                report.output = Some(reference);
                report.succeeded = true;
            }
            Err(err) => {
                warn!("extract {} failed: {err}", request.job_name());
                report.error = Some(error_chain(&err));
            }
        }
        report
    }

    /// Run every stage and return the filtered extract.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure.
    pub fn try_run(&self, request: &ExtractRequest) -> Result<StagedFile, PipelineError> {
        self.execute(request, &mut Vec::new())
    }

    fn execute(
        &self,
        request: &ExtractRequest,
        stages: &mut Vec<ConversionResult>,
    ) -> Result<StagedFile, PipelineError> {
        let layout = request.staging();
        osm_export_fs::ensure_dir(layout.directory()).map_err(|source| {
            PipelineError::Staging {
                path: layout.directory().to_path_buf(),
                source,
            }
        })?;

        discard(layout.filtered_osm().path());
        let raw = layout.raw_osm();
        let fetched = self.fetcher.fetch(&request.query(), raw.path());
        stages.push(ConversionResult::from_outcome(
            Stage::Fetch,
            raw.path(),
            &fetched,
        ));
        fetched?;

        let filter = TagFilter::new(
            &self.runner,
            self.tools.osmconvert.as_str(),
            self.tools.osmfilter.as_str(),
            layout.clone(),
        )
        .with_template(Arc::clone(&self.template))
        .with_timeout(self.options.subprocess_timeout);
        let filtered = filter.filter_by_tags(raw.path(), request.tag_filters());
        record_filter(stages, request, &filtered);
        let FilterOutcome {
            filtered, compact, ..
        } = filtered?;

        if !osm_export_fs::inspect(filtered.path())
            .map_err(|source| PipelineError::Staging {
                path: filtered.path().to_path_buf(),
                source,
            })?
            .is_file()
        {
            return Err(PipelineError::MissingOutput {
                path: filtered.into_path(),
            });
        }
        if !self.options.retain_intermediates {
            discard(raw.path());
            if let Some(compact) = compact {
                discard(compact.path());
            }
        }
        info!("extract {} written to {}", request.job_name(), filtered.path());
        Ok(filtered)
    }
}

fn record_filter(
    stages: &mut Vec<ConversionResult>,
    request: &ExtractRequest,
    outcome: &Result<FilterOutcome, FilterError>,
) {
    let compact = request.staging().compact_osm();
    let filtered = request.staging().filtered_osm();
    match outcome {
        Ok(done) => {
            if let Some(staged) = &done.compact {
                stages.push(ConversionResult::success(Stage::Compact, staged.path()));
            }
            stages.push(ConversionResult::success(
                Stage::Filter,
                done.filtered.path(),
            ));
        }
        Err(err @ FilterError::Conversion { .. }) => {
            stages.push(ConversionResult::failure(Stage::Compact, compact.path(), err));
        }
        Err(err @ FilterError::Filter { .. }) => {
            stages.push(ConversionResult::success(Stage::Compact, compact.path()));
            stages.push(ConversionResult::failure(Stage::Filter, filtered.path(), err));
        }
        Err(err) => {
            stages.push(ConversionResult::failure(Stage::Filter, filtered.path(), err));
        }
    }
}

fn discard(path: &Utf8Path) {
    if let Err(err) = osm_export_fs::remove_file_if_exists(path) {
        warn!("failed to remove intermediate {path}: {err}");
    }
}
