//! Per-stage outcomes handed back to the orchestrating caller.

use std::{error::Error, fmt};

use camino::{Utf8Path, Utf8PathBuf};

/// Pipeline stage a [`ConversionResult`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "kebab-case")
)]
pub enum Stage {
    /// Overpass download.
    Fetch,
    /// XML to compact binary conversion.
    Compact,
    /// Keep-rule filtering.
    Filter,
    /// Thematic schema and spatial index generation.
    Schema,
    /// Geo-package to shapefile conversion.
    Convert,
    /// Zip archival.
    Archive,
}

impl Stage {
    /// Stable lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Compact => "compact",
            Self::Filter => "filter",
            Self::Schema => "schema",
            Self::Convert => "convert",
            Self::Archive => "archive",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal value of one stage: where its output lives, or why it failed.
///
/// Results are never retried by the pipeline; persisting them is the caller's
/// job.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ConversionResult {
    /// Stage that produced the result.
    pub stage: Stage,
    /// Declared output path of the stage.
    pub output_path: Utf8PathBuf,
    /// Whether the stage completed.
    pub succeeded: bool,
    /// Error display chain when the stage failed.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub error_detail: Option<String>,
}

impl ConversionResult {
    /// Successful stage output.
    pub fn success(stage: Stage, output_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            stage,
            output_path: output_path.into(),
            succeeded: true,
            error_detail: None,
        }
    }

    /// Failed stage, recording the full error chain.
    pub fn failure(
        stage: Stage,
        output_path: impl Into<Utf8PathBuf>,
        error: &(dyn Error + 'static),
    ) -> Self {
        Self {
            stage,
            output_path: output_path.into(),
            succeeded: false,
            error_detail: Some(error_chain(error)),
        }
    }

    /// Build a result from any stage outcome.
    pub fn from_outcome<T, E>(stage: Stage, output_path: &Utf8Path, outcome: &Result<T, E>) -> Self
    where
        E: Error + 'static,
    {
        match outcome {
            Ok(_) => Self::success(stage, output_path),
            Err(err) => Self::failure(stage, output_path, err),
        }
    }
}

/// Join an error and its sources with `": "`.
#[must_use]
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        let text = source.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        current = source.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("inner failure")]
    struct Inner;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer(#[source] Inner);

    #[rstest]
    fn success_has_no_detail() {
        let outcome: Result<(), Outer> = Ok(());
        let result = ConversionResult::from_outcome(Stage::Fetch, Utf8Path::new("/a"), &outcome);
        assert!(result.succeeded);
        assert_eq!(result.error_detail, None);
    }

    #[rstest]
    fn failure_records_source_chain() {
        let outcome: Result<(), Outer> = Err(Outer(Inner));
        let result = ConversionResult::from_outcome(Stage::Archive, Utf8Path::new("/a"), &outcome);
        assert!(!result.succeeded);
        assert_eq!(
            result.error_detail.as_deref(),
            Some("outer failure: inner failure")
        );
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn serialises_stage_names() {
        let result = ConversionResult::success(Stage::Compact, "/stage/query.o5m");
        let json = serde_json::to_value(&result).expect("serialise");
        assert_eq!(json["stage"], "compact");
        assert_eq!(json["output_path"], "/stage/query.o5m");
        assert!(json.get("error_detail").is_none());
    }
}
