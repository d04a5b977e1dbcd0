//! Parameter-file syntax for the keep-rule filter.

use osm_export_core::KeepRule;

/// Renders keep-rules into the filter tool's parameter file.
///
/// The syntax belongs to the external tool and may change between versions,
/// so it sits behind this trait.
pub trait FilterTemplate: Send + Sync {
    /// Render `rules`, which is never empty.
    fn render(&self, rules: &[KeepRule]) -> String;
}

/// `osmfilter` object filter: `--keep=<rule> or <rule> …`.
///
/// Blanks inside keys and values are backslash-escaped so a value such as
/// `Oak Lane` stays one term.
///
/// # Examples
/// ```
/// use osm_export_core::KeepRule;
/// use osm_export_data::{FilterTemplate, OsmfilterTemplate};
///
/// # fn main() -> Result<(), osm_export_core::ConfigurationError> {
/// let rules = KeepRule::parse_all(["highway=primary", "amenity:school"])?;
/// assert_eq!(
///     OsmfilterTemplate.render(&rules),
///     "--keep=highway=primary or amenity=school"
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OsmfilterTemplate;

impl FilterTemplate for OsmfilterTemplate {
    fn render(&self, rules: &[KeepRule]) -> String {
        let joined = rules
            .iter()
            .map(|rule| {
                format!(
                    "{}={}",
                    escape_blanks(rule.key()),
                    escape_blanks(rule.value().unwrap_or_default())
                )
            })
            .collect::<Vec<_>>()
            .join(" or ");
        format!("--keep={joined}")
    }
}

fn escape_blanks(term: &str) -> String {
    term.replace(' ', "\\ ")
}
