//! Overpass QL query construction.
//!
//! The builder always requests the full bounding-box extract. Filtering by tag
//! inside Overpass QL is not viable: the interpreter caps a query at roughly
//! 1023 statements, while a thematic tag vocabulary needs one statement per tag
//! and element type. Tag filtering therefore happens locally after download.

use std::{fmt, ops::Deref};

use crate::{BoundingBox, ConfigurationError};

/// Default `maxsize` directive, in bytes (2 GiB).
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 2_147_483_648;

/// Default `timeout` directive, in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 1600;

/// A rendered Overpass QL statement.
///
/// # Examples
/// ```
/// # use osm_export_core::OverpassQuery;
/// let query = OverpassQuery::new("[timeout:25];node(1,2,3,4);out body;");
/// assert!(query.as_ref().ends_with("out body;"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverpassQuery(String);

impl OverpassQuery {
    /// Wrap an already rendered statement.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Consume the wrapper and return the inner [`String`].
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for OverpassQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for OverpassQuery {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for OverpassQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds bounding-box extract queries with `maxsize` and `timeout` limits.
///
/// The statement selects every node inside the box, then recurses up to the
/// ways and relations that reference those nodes and back down to their
/// members, so that returned ways and relations are complete.
///
/// # Examples
/// ```
/// use osm_export_core::{BoundingBox, QueryBuilder};
///
/// # fn main() -> Result<(), osm_export_core::ConfigurationError> {
/// let bbox = BoundingBox::new(22.6, -8.14, 27.12, -7.96)?;
/// let query = QueryBuilder::default().build(&bbox);
/// assert!(query.contains("[bbox:22.6,-8.14,27.12,-7.96]"));
/// assert!(query.contains("timeout:1600"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryBuilder {
    max_size_bytes: u64,
    timeout_seconds: u64,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE_BYTES, DEFAULT_TIMEOUT_SECONDS)
    }
}

impl QueryBuilder {
    /// Construct a builder with explicit limits.
    #[must_use]
    pub const fn new(max_size_bytes: u64, timeout_seconds: u64) -> Self {
        Self {
            max_size_bytes,
            timeout_seconds,
        }
    }

    /// Override the `maxsize` directive.
    #[must_use]
    pub const fn with_max_size(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    /// Override the `timeout` directive.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Render the extract statement for a validated bounding box.
    #[must_use]
    pub fn build(&self, bbox: &BoundingBox) -> OverpassQuery {
        OverpassQuery(format!(
            "[maxsize:{max_size}][timeout:{timeout}][bbox:{bbox}];(node;<;>>;>;);out body;",
            max_size = self.max_size_bytes,
            timeout = self.timeout_seconds,
        ))
    }

    /// Parse `miny,minx,maxy,maxx` and render the extract statement.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when the bounding box is malformed.
    pub fn build_from_str(&self, raw_bbox: &str) -> Result<OverpassQuery, ConfigurationError> {
        let bbox: BoundingBox = raw_bbox.parse()?;
        Ok(self.build(&bbox))
    }
}

/// Render an extract statement with explicit limits.
///
/// # Errors
///
/// Returns [`ConfigurationError`] when the raw bounding box is malformed.
pub fn build_query(
    raw_bbox: &str,
    max_size_bytes: u64,
    timeout_seconds: u64,
) -> Result<OverpassQuery, ConfigurationError> {
    QueryBuilder::new(max_size_bytes, timeout_seconds).build_from_str(raw_bbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn bbox() -> BoundingBox {
        BoundingBox::new(22.6, -8.14, 27.12, -7.96).expect("valid bbox")
    }

    #[rstest]
    fn renders_default_limits(bbox: BoundingBox) {
        let query = QueryBuilder::default().build(&bbox);
        assert_eq!(
            query.as_ref(),
            "[maxsize:2147483648][timeout:1600][bbox:22.6,-8.14,27.12,-7.96];(node;<;>>;>;);out body;"
        );
    }

    #[rstest]
    fn renders_custom_limits(bbox: BoundingBox) {
        let query = QueryBuilder::default()
            .with_max_size(1024)
            .with_timeout(30)
            .build(&bbox);
        assert!(query.starts_with("[maxsize:1024][timeout:30]"));
    }

    #[rstest]
    fn leaves_no_template_placeholders(bbox: BoundingBox) {
        let query = QueryBuilder::default().build(&bbox);
        assert!(!query.contains('$'));
        assert!(!query.contains('{'));
    }

    #[rstest]
    #[case("27.12,-8.14,22.6,-7.96")]
    #[case("22.6,-8.14,27.12")]
    #[case("22.6,west,27.12,-7.96")]
    fn malformed_boxes_fail_before_rendering(#[case] raw: &str) {
        let outcome = build_query(raw, DEFAULT_MAX_SIZE_BYTES, DEFAULT_TIMEOUT_SECONDS);
        assert!(outcome.is_err(), "expected configuration error for {raw:?}");
    }
}
