//! Extraction requests and Overpass endpoint settings.

use std::time::Duration;

use url::Url;

use crate::{
    BoundingBox, ConfigurationError, KeepRule, QueryBuilder, StagingLayout,
    query::{DEFAULT_MAX_SIZE_BYTES, DEFAULT_TIMEOUT_SECONDS},
};

/// Public Overpass interpreter used when no endpoint is configured.
pub const DEFAULT_OVERPASS_URL: &str = "http://overpass-api.de/api/interpreter";

/// `User-Agent` sent with Overpass requests.
pub const DEFAULT_USER_AGENT: &str = concat!("osm-export/", env!("CARGO_PKG_VERSION"));

/// Endpoint and limits for talking to an Overpass interpreter.
///
/// The value is passed explicitly to every component that needs it; there are
/// no process-wide defaults beyond the constants above.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OverpassSettings {
    url: Url,
    max_response_bytes: u64,
    timeout_seconds: u64,
    user_agent: String,
}

impl OverpassSettings {
    /// Parse the endpoint URL and apply default limits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidEndpoint`] when `url` does not
    /// parse.
    pub fn new(url: &str) -> Result<Self, ConfigurationError> {
        let parsed = Url::parse(url).map_err(|source| ConfigurationError::InvalidEndpoint {
            url: url.to_owned(),
            source,
        })?;
        Ok(Self::from_url(parsed))
    }

    /// Use an already parsed endpoint with default limits.
    #[must_use]
    pub fn from_url(url: Url) -> Self {
        Self {
            url,
            max_response_bytes: DEFAULT_MAX_SIZE_BYTES,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Override the `maxsize` directive.
    #[must_use]
    pub const fn with_max_response_bytes(mut self, bytes: u64) -> Self {
        self.max_response_bytes = bytes;
        self
    }

    /// Override both the query timeout and the HTTP request timeout.
    #[must_use]
    pub const fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Interpreter endpoint.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Maximum response size requested from the interpreter.
    #[must_use]
    pub const fn max_response_bytes(&self) -> u64 {
        self.max_response_bytes
    }

    /// Query timeout, in seconds.
    #[must_use]
    pub const fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// `User-Agent` header value.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Query builder configured with these limits.
    #[must_use]
    pub const fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(self.max_response_bytes, self.timeout_seconds)
    }
}

impl Default for OverpassSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_response_bytes: DEFAULT_MAX_SIZE_BYTES,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

#[expect(
    clippy::expect_used,
    reason = "the default endpoint is a compile-time constant known to parse"
)]
fn default_url() -> Url {
    Url::parse(DEFAULT_OVERPASS_URL).expect("default Overpass URL parses")
}

/// Everything one extraction attempt needs, fixed at construction.
///
/// # Examples
/// ```
/// use osm_export_core::{BoundingBox, ExtractRequest, OverpassSettings, StagingLayout};
///
/// # fn main() -> Result<(), osm_export_core::ConfigurationError> {
/// let request = ExtractRequest::new(
///     "22.6,-8.14,27.12,-7.96".parse::<BoundingBox>()?,
///     StagingLayout::for_run("/srv/staging", "run-1", "kathmandu")?,
///     ["highway=primary"],
///     OverpassSettings::default(),
/// )?;
/// assert_eq!(request.tag_filters().len(), 1);
/// assert!(request.query().contains("timeout:1600"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRequest {
    bounding_box: BoundingBox,
    staging: StagingLayout,
    tag_filters: Vec<KeepRule>,
    overpass: OverpassSettings,
}

impl ExtractRequest {
    /// Validate the tag filters and assemble a request.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidKeepRule`] for the first filter
    /// that does not parse.
    pub fn new<I, S>(
        bounding_box: BoundingBox,
        staging: StagingLayout,
        tag_filters: I,
        overpass: OverpassSettings,
    ) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            bounding_box,
            staging,
            tag_filters: KeepRule::parse_all(tag_filters)?,
            overpass,
        })
    }

    /// Extraction area.
    #[must_use]
    pub const fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    /// Staging layout owned by this run.
    #[must_use]
    pub const fn staging(&self) -> &StagingLayout {
        &self.staging
    }

    /// Job name used for the filtered output.
    #[must_use]
    pub fn job_name(&self) -> &str {
        self.staging.job_name()
    }

    /// Ordered keep-rules.
    #[must_use]
    pub fn tag_filters(&self) -> &[KeepRule] {
        &self.tag_filters
    }

    /// Endpoint and limits.
    #[must_use]
    pub const fn overpass(&self) -> &OverpassSettings {
        &self.overpass
    }

    /// Render the Overpass query for this request.
    #[must_use]
    pub fn query(&self) -> crate::OverpassQuery {
        self.overpass.query_builder().build(&self.bounding_box)
    }
}
