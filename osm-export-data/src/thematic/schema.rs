//! Per-theme table planning and SQL script rendering.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use camino::Utf8Path;
use log::debug;
use osm_export_core::{CategorisedTag, ConfigurationError, GeometryType};
use rusqlite::{Connection, OpenFlags};

/// Hstore-style column in which the OGR OSM driver keeps unpromoted tags.
pub const OTHER_TAGS_COLUMN: &str = "other_tags";

/// A feature table registered in `gpkg_geometry_columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayer {
    /// Table name, e.g. `points` or `multipolygons`.
    pub table_name: String,
    /// Geometry column name.
    pub geometry_column: String,
    /// Upper-case geometry type name, e.g. `MULTIPOLYGON`.
    pub geometry_type_name: String,
    /// Spatial reference system identifier.
    pub srs_id: i64,
    /// Attribute columns of the table.
    pub columns: BTreeSet<String>,
}

impl SourceLayer {
    fn rank_for(&self, geometry: GeometryType) -> Option<usize> {
        source_geometry_names(geometry)
            .iter()
            .position(|name| self.geometry_type_name.eq_ignore_ascii_case(name))
    }
}

/// Preferred source geometry type names per geometry family, best first.
const fn source_geometry_names(geometry: GeometryType) -> [&'static str; 2] {
    match geometry {
        GeometryType::Point => ["POINT", "MULTIPOINT"],
        GeometryType::Line => ["LINESTRING", "MULTILINESTRING"],
        GeometryType::Polygon => ["MULTIPOLYGON", "POLYGON"],
    }
}

/// Read the feature layers of the geo-package at `path`.
///
/// The database is opened read-only; schema changes are applied by the
/// generated script, never through this connection.
///
/// # Errors
///
/// Returns the `SQLite` error when the file is not a geo-package or the
/// metadata tables cannot be read.
pub fn read_layers(path: &Utf8Path) -> Result<Vec<SourceLayer>, rusqlite::Error> {
    let connection = Connection::open_with_flags(
        path.as_std_path(),
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let mut statement = connection.prepare(
        "SELECT table_name, column_name, geometry_type_name, srs_id
           FROM gpkg_geometry_columns
          ORDER BY table_name",
    )?;
    let rows = statement.query_map([], |row| {
        Ok(SourceLayer {
            table_name: row.get(0)?,
            geometry_column: row.get(1)?,
            geometry_type_name: row.get::<_, String>(2)?.to_ascii_uppercase(),
            srs_id: row.get(3)?,
            columns: BTreeSet::new(),
        })
    })?;
    let mut layers = rows.collect::<Result<Vec<_>, _>>()?;
    for layer in &mut layers {
        layer.columns = table_columns(&connection, &layer.table_name)?;
    }
    Ok(layers)
}

fn table_columns(
    connection: &Connection,
    table: &str,
) -> Result<BTreeSet<String>, rusqlite::Error> {
    let mut statement =
        connection.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let names = statement.query_map([table], |row| row.get::<_, String>(0))?;
    names.collect()
}

/// One output table: every tag of a theme on one geometry family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeTable {
    /// Output table name, `<theme>_<points|lines|polygons>`.
    pub name: String,
    /// Geometry family of the table.
    pub geometry: GeometryType,
    /// Layer the rows are selected from.
    pub source: SourceLayer,
    /// SQL predicates, any of which selects a row.
    pub predicates: Vec<String>,
}

/// The set of theme tables a schema script creates.
///
/// # Examples
/// ```
/// use osm_export_data::SchemaPlan;
///
/// let plan = SchemaPlan::build(&[], &[]).expect("empty plan");
/// assert!(plan.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaPlan {
    tables: Vec<ThemeTable>,
}

impl SchemaPlan {
    /// Group `tags` by theme and geometry family and match each group to a
    /// source layer in `layers`.
    ///
    /// Groups with no matching layer, or whose tags match no column, are
    /// skipped and logged at `debug`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidTheme`] when a theme has no
    /// alphanumeric characters to name a table with.
    pub fn build(
        tags: &[CategorisedTag],
        layers: &[SourceLayer],
    ) -> Result<Self, ConfigurationError> {
        let mut groups: BTreeMap<(String, GeometryType), Vec<&CategorisedTag>> = BTreeMap::new();
        for tag in tags {
            let slug = tag.theme_slug()?;
            for geometry in &tag.geometry_types {
                groups.entry((slug.clone(), *geometry)).or_default().push(tag);
            }
        }

        let mut tables = Vec::new();
        for ((slug, geometry), members) in groups {
            let name = format!("{slug}_{}", geometry.table_suffix());
            let Some(source) = best_layer(layers, geometry) else {
                debug!("skipping {name}: no {geometry} layer in geo-package");
                continue;
            };
            let mut predicates = Vec::new();
            for tag in members {
                if let Some(predicate) = tag_predicate(tag, &source.columns) {
                    if !predicates.contains(&predicate) {
                        predicates.push(predicate);
                    }
                }
            }
            if predicates.is_empty() {
                debug!("skipping {name}: no tag matches a column of {}", source.table_name);
                continue;
            }
            tables.push(ThemeTable {
                name,
                geometry,
                source: source.clone(),
                predicates,
            });
        }
        Ok(Self { tables })
    }

    /// Planned tables in name order.
    #[must_use]
    pub fn tables(&self) -> &[ThemeTable] {
        &self.tables
    }

    /// Names of the planned tables.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|table| table.name.clone()).collect()
    }

    /// Whether no table will be created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn best_layer(layers: &[SourceLayer], geometry: GeometryType) -> Option<&SourceLayer> {
    layers
        .iter()
        .filter_map(|layer| layer.rank_for(geometry).map(|rank| (rank, layer)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, layer)| layer)
}

/// Predicate selecting rows carrying `tag`, or `None` when no column can
/// hold it.
fn tag_predicate(tag: &CategorisedTag, columns: &BTreeSet<String>) -> Option<String> {
    if columns.contains(&tag.key) {
        let column = quote_identifier(&tag.key);
        return Some(if tag.value.is_empty() {
            format!("{column} IS NOT NULL")
        } else {
            format!("{column} = {}", quote_literal(&tag.value))
        });
    }
    if !columns.contains(OTHER_TAGS_COLUMN) {
        return None;
    }
    let key = escape_like(&tag.key);
    let pattern = if tag.value.is_empty() {
        format!("%\"{key}\"=>%")
    } else {
        format!("%\"{key}\"=>\"{}\"%", escape_like(&tag.value))
    };
    Some(format!(
        "{} LIKE {} ESCAPE '\\'",
        quote_identifier(OTHER_TAGS_COLUMN),
        quote_literal(&pattern)
    ))
}

/// Double-quote an SQL identifier.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote an SQL string literal.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Renders a [`SchemaPlan`] into the script fed to the spatial SQL shell.
///
/// The dialect belongs to the external shell and may change between
/// versions, so it sits behind this trait.
pub trait SchemaTemplate: Send + Sync {
    /// Render the script for `plan`, which may be empty.
    fn render(&self, plan: &SchemaPlan) -> String;
}

/// Spatialite shell dialect for geo-packages.
///
/// The whole script runs in one transaction under `.bail on`, so a failing
/// statement leaves the geo-package as it was. Every table is dropped and
/// re-registered, which makes re-running the script idempotent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeopackageSchemaTemplate;

impl SchemaTemplate for GeopackageSchemaTemplate {
    fn render(&self, plan: &SchemaPlan) -> String {
        let mut script = String::from(".bail on\nBEGIN;\n");
        for table in plan.tables() {
            render_table(&mut script, table);
        }
        script.push_str("COMMIT;\n");
        script
    }
}

fn render_table(script: &mut String, table: &ThemeTable) {
    let name = quote_identifier(&table.name);
    let literal = quote_literal(&table.name);
    let geometry_column = &table.source.geometry_column;
    let rtree = quote_identifier(&format!("rtree_{}_{geometry_column}", table.name));
    let selection = table
        .predicates
        .iter()
        .map(|predicate| format!("({predicate})"))
        .collect::<Vec<_>>()
        .join(" OR ");
    // `write!` into a `String` cannot fail.
    let _ = write!(
        script,
        "DROP TABLE IF EXISTS {rtree};\n\
         DELETE FROM gpkg_extensions WHERE table_name = {literal};\n\
         DELETE FROM gpkg_geometry_columns WHERE table_name = {literal};\n\
         DELETE FROM gpkg_contents WHERE table_name = {literal};\n\
         DROP TABLE IF EXISTS {name};\n\
         CREATE TABLE {name} AS SELECT * FROM {source} WHERE {selection};\n\
         INSERT INTO gpkg_contents (table_name, data_type, identifier, srs_id) \
         VALUES ({literal}, 'features', {literal}, {srs});\n\
         INSERT INTO gpkg_geometry_columns (table_name, column_name, geometry_type_name, srs_id, z, m) \
         VALUES ({literal}, {column}, {kind}, {srs}, 0, 0);\n\
         SELECT gpkgAddSpatialIndex({literal}, {column});\n",
        source = quote_identifier(&table.source.table_name),
        srs = table.source.srs_id,
        column = quote_literal(geometry_column),
        kind = quote_literal(&table.source.geometry_type_name),
    );
}
