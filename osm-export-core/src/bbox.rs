//! WGS84 bounding boxes describing the extraction area.

use std::{fmt, str::FromStr};

use geo::{Coord, Rect};

use crate::ConfigurationError;

const COMPONENTS: [&str; 4] = ["miny", "minx", "maxy", "maxx"];

/// Rectangular extraction area in WGS84 degrees.
///
/// Components are ordered `(min_y, min_x, max_y, max_x)`, matching the
/// Overpass `bbox` convention of south, west, north, east. Construction
/// guarantees `min_y < max_y` and `min_x < max_x`; the value is immutable
/// afterwards.
///
/// # Examples
///
/// ```
/// use osm_export_core::BoundingBox;
///
/// # fn main() -> Result<(), osm_export_core::ConfigurationError> {
/// let bbox: BoundingBox = "22.6,-8.14,27.12,-7.96".parse()?;
/// assert_eq!(bbox.to_string(), "22.6,-8.14,27.12,-7.96");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BoundingBox {
    min_y: f64,
    min_x: f64,
    max_y: f64,
    max_x: f64,
}

impl BoundingBox {
    /// Validate and construct a bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when a component is not finite, lies
    /// outside WGS84 bounds, or when an axis is inverted or empty.
    pub fn new(min_y: f64, min_x: f64, max_y: f64, max_x: f64) -> Result<Self, ConfigurationError> {
        let components = [min_y, min_x, max_y, max_x];
        for (component, value) in COMPONENTS.into_iter().zip(components) {
            if !value.is_finite() {
                return Err(ConfigurationError::NonFiniteCoordinate { component });
            }
            let (lower, upper) = if component.ends_with('y') {
                (-90.0, 90.0)
            } else {
                (-180.0, 180.0)
            };
            if value < lower || value > upper {
                return Err(ConfigurationError::CoordinateOutOfRange { component, value });
            }
        }
        if min_y >= max_y {
            return Err(ConfigurationError::InvertedBounds {
                axis: "y",
                min: min_y,
                max: max_y,
            });
        }
        if min_x >= max_x {
            return Err(ConfigurationError::InvertedBounds {
                axis: "x",
                min: min_x,
                max: max_x,
            });
        }
        Ok(Self {
            min_y,
            min_x,
            max_y,
            max_x,
        })
    }

    /// Southern latitude.
    #[must_use]
    pub const fn min_y(&self) -> f64 {
        self.min_y
    }

    /// Western longitude.
    #[must_use]
    pub const fn min_x(&self) -> f64 {
        self.min_x
    }

    /// Northern latitude.
    #[must_use]
    pub const fn max_y(&self) -> f64 {
        self.max_y
    }

    /// Eastern longitude.
    #[must_use]
    pub const fn max_x(&self) -> f64 {
        self.max_x
    }

    /// View the box as a [`geo::Rect`] with `x = longitude`, `y = latitude`.
    #[must_use]
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
        )
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_y, self.min_x, self.max_y, self.max_x
        )
    }
}

impl FromStr for BoundingBox {
    type Err = ConfigurationError;

    /// Parse the `miny,minx,maxy,maxx` form accepted on the command line.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        let [min_y, min_x, max_y, max_x] = parts.as_slice() else {
            return Err(ConfigurationError::MissingComponent { found: parts.len() });
        };
        Self::new(
            parse_component("miny", min_y)?,
            parse_component("minx", min_x)?,
            parse_component("maxy", max_y)?,
            parse_component("maxx", max_x)?,
        )
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = ConfigurationError;

    fn try_from([min_y, min_x, max_y, max_x]: [f64; 4]) -> Result<Self, Self::Error> {
        Self::new(min_y, min_x, max_y, max_x)
    }
}

fn parse_component(component: &'static str, raw: &str) -> Result<f64, ConfigurationError> {
    if raw.is_empty() {
        return Err(ConfigurationError::InvalidCoordinate {
            component,
            raw: raw.to_owned(),
        });
    }
    raw.parse::<f64>()
        .map_err(|_| ConfigurationError::InvalidCoordinate {
            component,
            raw: raw.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn parses_legacy_argument_order() {
        let bbox: BoundingBox = "22.6,-8.14,27.12,-7.96".parse().expect("valid bbox");
        assert_eq!(bbox.min_y(), 22.6);
        assert_eq!(bbox.min_x(), -8.14);
        assert_eq!(bbox.max_y(), 27.12);
        assert_eq!(bbox.max_x(), -7.96);
    }

    #[rstest]
    fn tolerates_whitespace_between_components() {
        let bbox: BoundingBox = " 1.5, 2.5 ,3.5,4.5 ".parse().expect("valid bbox");
        assert_eq!(bbox.to_string(), "1.5,2.5,3.5,4.5");
    }

    #[rstest]
    #[case("1,2,3", 3)]
    #[case("1,2,3,4,5", 5)]
    #[case("", 1)]
    fn rejects_wrong_component_count(#[case] raw: &str, #[case] found: usize) {
        let err = raw.parse::<BoundingBox>().expect_err("component count");
        assert_eq!(err, ConfigurationError::MissingComponent { found });
    }

    #[rstest]
    #[case("a,2,3,4", "miny")]
    #[case("1,,3,4", "minx")]
    #[case("1,2,north,4", "maxy")]
    fn rejects_non_numeric_components(#[case] raw: &str, #[case] expected: &str) {
        match raw.parse::<BoundingBox>() {
            Err(ConfigurationError::InvalidCoordinate { component, .. }) => {
                assert_eq!(component, expected);
            }
            other => panic!("expected InvalidCoordinate, got {other:?}"),
        }
    }

    #[rstest]
    #[case(27.12, -8.14, 22.6, -7.96, "y")]
    #[case(22.6, -7.96, 27.12, -8.14, "x")]
    #[case(22.6, -8.14, 22.6, -7.96, "y")]
    fn rejects_inverted_axes(
        #[case] min_y: f64,
        #[case] min_x: f64,
        #[case] max_y: f64,
        #[case] max_x: f64,
        #[case] expected_axis: &str,
    ) {
        match BoundingBox::new(min_y, min_x, max_y, max_x) {
            Err(ConfigurationError::InvertedBounds { axis, .. }) => assert_eq!(axis, expected_axis),
            other => panic!("expected InvertedBounds, got {other:?}"),
        }
    }

    #[rstest]
    fn rejects_non_finite_values() {
        let err = BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).expect_err("NaN component");
        assert_eq!(
            err,
            ConfigurationError::NonFiniteCoordinate { component: "miny" }
        );
    }

    #[rstest]
    fn rejects_out_of_range_latitude() {
        let err = BoundingBox::new(-91.0, 0.0, 1.0, 1.0).expect_err("latitude range");
        assert!(matches!(
            err,
            ConfigurationError::CoordinateOutOfRange {
                component: "miny",
                ..
            }
        ));
    }

    #[rstest]
    fn converts_to_rect_with_lon_lat_axes() {
        let bbox = BoundingBox::try_from([10.0, 20.0, 11.0, 21.0]).expect("valid bbox");
        let rect = bbox.to_rect();
        assert_eq!(rect.min(), Coord { x: 20.0, y: 10.0 });
        assert_eq!(rect.max(), Coord { x: 21.0, y: 11.0 });
    }
}
