//! Tag keep-rules used to reduce a raw extract.

use std::{fmt, str::FromStr};

use crate::ConfigurationError;

/// A single `key=value` predicate retaining matching OSM features.
///
/// Rules accept three spellings:
/// - `key=value`, split at the first `=`;
/// - `key:value`, split at the last `:` so namespaced keys such as
///   `addr:street:Main` keep their prefix;
/// - a bare `key`, which matches any value.
///
/// # Examples
/// ```
/// use osm_export_core::KeepRule;
///
/// # fn main() -> Result<(), osm_export_core::ConfigurationError> {
/// let rule: KeepRule = "highway:primary".parse()?;
/// assert_eq!(rule.key(), "highway");
/// assert_eq!(rule.value(), Some("primary"));
/// assert_eq!(rule.to_string(), "highway=primary");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct KeepRule {
    key: String,
    value: Option<String>,
}

impl KeepRule {
    /// Construct a rule from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidKeepRule`] when the key is blank.
    pub fn new(key: &str, value: Option<&str>) -> Result<Self, ConfigurationError> {
        let trimmed_key = key.trim();
        if trimmed_key.is_empty() {
            return Err(ConfigurationError::InvalidKeepRule {
                raw: value.map_or_else(|| key.to_owned(), |v| format!("{key}={v}")),
            });
        }
        let trimmed_value = value.map(str::trim).filter(|v| !v.is_empty());
        Ok(Self {
            key: trimmed_key.to_owned(),
            value: trimmed_value.map(str::to_owned),
        })
    }

    /// Key the rule matches on.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value the rule matches on, or `None` for any value.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Parse every entry of an ordered filter list, preserving order.
    ///
    /// # Errors
    ///
    /// Returns the first entry that fails to parse.
    pub fn parse_all<I, S>(filters: I) -> Result<Vec<Self>, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        filters
            .into_iter()
            .map(|raw| raw.as_ref().parse())
            .collect()
    }
}

impl FromStr for KeepRule {
    type Err = ConfigurationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigurationError::InvalidKeepRule {
            raw: raw.to_owned(),
        };
        let (key, value) = match raw.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => match raw.rsplit_once(':') {
                Some((key, value)) => (key, Some(value)),
                None => (raw, None),
            },
        };
        Self::new(key, value).map_err(|_| invalid())
    }
}

impl fmt::Display for KeepRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("highway=primary", "highway", Some("primary"))]
    #[case("highway:primary", "highway", Some("primary"))]
    #[case("addr:street=Main", "addr:street", Some("Main"))]
    #[case("building:part:yes", "building:part", Some("yes"))]
    #[case("amenity", "amenity", None)]
    #[case(" name = Oak Lane ", "name", Some("Oak Lane"))]
    #[case("amenity=", "amenity", None)]
    fn parses_supported_spellings(
        #[case] raw: &str,
        #[case] key: &str,
        #[case] value: Option<&str>,
    ) {
        let rule: KeepRule = raw.parse().expect("rule should parse");
        assert_eq!(rule.key(), key);
        assert_eq!(rule.value(), value);
    }

    #[rstest]
    #[case("")]
    #[case("=primary")]
    #[case(":primary")]
    #[case("   ")]
    fn rejects_blank_keys(#[case] raw: &str) {
        let err = raw.parse::<KeepRule>().expect_err("blank key");
        assert_eq!(
            err,
            ConfigurationError::InvalidKeepRule {
                raw: raw.to_owned()
            }
        );
    }

    #[rstest]
    fn renders_any_value_rules_with_trailing_equals() {
        let rule: KeepRule = "amenity".parse().expect("rule should parse");
        assert_eq!(rule.to_string(), "amenity=");
    }

    #[rstest]
    fn parse_all_preserves_order() {
        let rules = KeepRule::parse_all(["b=2", "a=1"]).expect("rules should parse");
        let rendered: Vec<String> = rules.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["b=2", "a=1"]);
    }
}
