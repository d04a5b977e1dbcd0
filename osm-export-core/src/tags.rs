//! Categorised tags that drive thematic schema generation.

use std::{collections::BTreeSet, fmt, str::FromStr};

use crate::ConfigurationError;

/// Geometry family a tag may appear on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum GeometryType {
    /// Nodes.
    Point,
    /// Open ways.
    Line,
    /// Closed ways and multipolygon relations.
    Polygon,
}

impl GeometryType {
    /// Every geometry type in schema order.
    pub const ALL: [Self; 3] = [Self::Point, Self::Line, Self::Polygon];

    /// Plural suffix used when naming per-theme tables.
    #[must_use]
    pub const fn table_suffix(self) -> &'static str {
        match self {
            Self::Point => "points",
            Self::Line => "lines",
            Self::Polygon => "polygons",
        }
    }

    /// Lower-case singular name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Polygon => "polygon",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeometryType {
    type Err = ConfigurationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "point" | "points" | "node" => Ok(Self::Point),
            "line" | "lines" | "linestring" | "way" => Ok(Self::Line),
            "polygon" | "polygons" | "area" | "multipolygon" => Ok(Self::Polygon),
            _ => Err(ConfigurationError::UnknownGeometryType {
                raw: raw.to_owned(),
            }),
        }
    }
}

/// A job tag assigned to a theme, read-only input to thematic conversion.
///
/// # Examples
/// ```
/// use osm_export_core::{CategorisedTag, GeometryType};
///
/// let tag = CategorisedTag::new("Hospital", "amenity", "hospital", "health")
///     .with_geometry(GeometryType::Point)
///     .with_geometry(GeometryType::Polygon);
/// assert_eq!(tag.theme, "health");
/// assert!(tag.geometry_types.contains(&GeometryType::Polygon));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategorisedTag {
    /// Human-readable name.
    pub name: String,
    /// OSM key.
    pub key: String,
    /// OSM value; empty matches any value.
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: String,
    /// Geometry types the tag applies to.
    #[cfg_attr(feature = "serde", serde(default, alias = "geom_types"))]
    pub geometry_types: BTreeSet<GeometryType>,
    /// Theme (category) the tag belongs to.
    #[cfg_attr(feature = "serde", serde(alias = "category"))]
    pub theme: String,
}

impl CategorisedTag {
    /// Construct a tag with no geometry types.
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        theme: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            value: value.into(),
            geometry_types: BTreeSet::new(),
            theme: theme.into(),
        }
    }

    /// Add a geometry type the tag applies to.
    #[must_use]
    pub fn with_geometry(mut self, geometry: GeometryType) -> Self {
        self.geometry_types.insert(geometry);
        self
    }

    /// Table-safe form of the theme: lower-case ASCII alphanumerics joined by
    /// single underscores.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidTheme`] when nothing usable
    /// remains after normalisation.
    pub fn theme_slug(&self) -> Result<String, ConfigurationError> {
        let slug = self
            .theme
            .split(|ch: char| !ch.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>()
            .join("_");
        if slug.is_empty() {
            Err(ConfigurationError::InvalidTheme {
                theme: self.theme.clone(),
            })
        } else {
            Ok(slug)
        }
    }
}
