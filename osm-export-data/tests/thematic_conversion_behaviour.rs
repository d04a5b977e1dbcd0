//! Behavioural coverage for thematic schema generation, conversion and
//! archival.

mod support;

use std::{cell::RefCell, fs, path::PathBuf};

use camino::Utf8PathBuf;
use osm_export_core::{CategorisedTag, GeometryType, StagingLayout};
use osm_export_data::{
    ThematicConverter, ThematicError, ThematicJob, ThematicState, ToolError, ToolPaths,
    tools::test_support::RecordingRunner,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use support::{seed_geopackage, temp_root};

/// Per-scenario workspace holding the source geo-package and outputs.
struct Workspace {
    _temp: TempDir,
    root: Utf8PathBuf,
    layout: StagingLayout,
}

impl Workspace {
    fn geopackage(&self) -> Utf8PathBuf {
        self.root.join("kathmandu.gpkg")
    }

    fn shapefile(&self) -> Utf8PathBuf {
        self.root.join("thematic_shp")
    }
}

type Converter = ThematicConverter<RecordingRunner>;
type StageCell = RefCell<Option<Result<Utf8PathBuf, ThematicError>>>;

#[fixture]
fn workspace() -> Workspace {
    let (temp, root) = temp_root();
    let layout = StagingLayout::new(root.join("stage"), "kathmandu")
        .unwrap_or_else(|err| panic!("invalid layout: {err}"));
    osm_export_fs::ensure_dir(layout.directory())
        .unwrap_or_else(|err| panic!("failed to create staging dir: {err}"));
    Workspace {
        _temp: temp,
        root,
        layout,
    }
}

#[fixture]
fn tags() -> RefCell<Vec<CategorisedTag>> {
    RefCell::new(Vec::new())
}

#[fixture]
fn runner() -> RefCell<RecordingRunner> {
    RefCell::new(RecordingRunner::materialising())
}

#[fixture]
fn converter() -> RefCell<Option<Converter>> {
    RefCell::new(None)
}

#[fixture]
fn outcome() -> StageCell {
    RefCell::new(None)
}

#[fixture]
fn archives() -> RefCell<Vec<String>> {
    RefCell::new(Vec::new())
}

fn build_converter(
    workspace: &Workspace,
    tags: &RefCell<Vec<CategorisedTag>>,
    runner: &RefCell<RecordingRunner>,
    converter: &RefCell<Option<Converter>>,
) {
    if converter.borrow().is_some() {
        return;
    }
    let job = ThematicJob::new(
        workspace.geopackage(),
        workspace.shapefile(),
        workspace.layout.clone(),
    )
    .with_tags(tags.borrow().iter().cloned());
    let built = ThematicConverter::new(job, runner.borrow().clone(), ToolPaths::default())
        .unwrap_or_else(|err| panic!("invalid thematic job: {err}"));
    *converter.borrow_mut() = Some(built);
}

fn with_converter<T>(
    converter: &RefCell<Option<Converter>>,
    action: impl FnOnce(&mut Converter) -> T,
) -> T {
    let mut borrowed = converter.borrow_mut();
    let active = borrowed.as_mut().expect("converter must be built");
    action(active)
}

// --- Given steps ---

#[given("a source geo-package")]
fn source_geopackage(#[from(workspace)] workspace: &Workspace) {
    seed_geopackage(&workspace.geopackage());
}

#[given("the categorised tag highway=primary in theme Transport on lines")]
fn categorised_tag(#[from(tags)] tags: &RefCell<Vec<CategorisedTag>>) {
    tags.borrow_mut().push(
        CategorisedTag::new("Primary road", "highway", "primary", "Transport")
            .with_geometry(GeometryType::Line),
    );
}

#[given("the shapefiles have been converted")]
fn shapefiles_converted(
    #[from(workspace)] workspace: &Workspace,
    #[from(tags)] tags: &RefCell<Vec<CategorisedTag>>,
    #[from(runner)] runner: &RefCell<RecordingRunner>,
    #[from(converter)] converter: &RefCell<Option<Converter>>,
) {
    build_converter(workspace, tags, runner, converter);
    with_converter(converter, ThematicConverter::convert)
        .unwrap_or_else(|err| panic!("conversion failed: {err}"));
}

#[given("ogr2ogr exits with status 1 and stderr \"Unable to open datasource\"")]
fn failing_ogr2ogr(#[from(runner)] runner: &RefCell<RecordingRunner>) {
    let failing = runner
        .borrow()
        .clone()
        .failing("ogr2ogr", 1, "Unable to open datasource");
    *runner.borrow_mut() = failing;
}

// --- When steps ---

#[when("I generate the thematic schema")]
fn generate_schema(
    #[from(workspace)] workspace: &Workspace,
    #[from(tags)] tags: &RefCell<Vec<CategorisedTag>>,
    #[from(runner)] runner: &RefCell<RecordingRunner>,
    #[from(converter)] converter: &RefCell<Option<Converter>>,
    #[from(outcome)] outcome: &StageCell,
) {
    build_converter(workspace, tags, runner, converter);
    let result = with_converter(converter, |active| {
        active
            .generate_thematic_schema()
            .map(|staged| staged.path().to_path_buf())
    });
    *outcome.borrow_mut() = Some(result);
}

#[when("I convert the geo-package to shapefiles")]
fn convert_geopackage(
    #[from(workspace)] workspace: &Workspace,
    #[from(tags)] tags: &RefCell<Vec<CategorisedTag>>,
    #[from(runner)] runner: &RefCell<RecordingRunner>,
    #[from(converter)] converter: &RefCell<Option<Converter>>,
    #[from(outcome)] outcome: &StageCell,
) {
    build_converter(workspace, tags, runner, converter);
    *outcome.borrow_mut() = Some(with_converter(converter, ThematicConverter::convert));
}

#[when("I archive the shapefiles twice")]
fn archive_twice(
    #[from(converter)] converter: &RefCell<Option<Converter>>,
    #[from(archives)] archives: &RefCell<Vec<String>>,
) {
    for _ in 0..2 {
        let archive = with_converter(converter, ThematicConverter::archive)
            .unwrap_or_else(|err| panic!("archiving failed: {err}"));
        let listing = osm_export_fs::read_to_string(&archive)
            .unwrap_or_else(|err| panic!("failed to read archive {archive}: {err}"));
        archives.borrow_mut().push(listing);
    }
}

// --- Then steps ---

#[then("the schema stage succeeds")]
fn schema_succeeds(
    #[from(outcome)] outcome: &StageCell,
    #[from(converter)] converter: &RefCell<Option<Converter>>,
) {
    let borrowed = outcome.borrow();
    let result = borrowed.as_ref().expect("schema stage ran");
    assert!(result.is_ok(), "schema failed: {result:?}");
    let state = with_converter(converter, |active| active.state());
    assert_eq!(state, ThematicState::SchemaWritten);
}

#[then("spatialite ran exactly once with the schema script as stdin")]
fn spatialite_once(
    #[from(workspace)] workspace: &Workspace,
    #[from(runner)] runner: &RefCell<RecordingRunner>,
) {
    let calls = runner.borrow().calls_to("spatialite");
    assert_eq!(calls.len(), 1);
    let call = calls.first().expect("spatialite call");
    let script = workspace.layout.schema_script().into_path();
    assert_eq!(call.invocation.stdin(), Some(script.as_path()));
    assert_eq!(
        call.invocation.arguments(),
        [workspace.layout.thematic_geopackage().path().to_string()]
    );
}

#[then("the schema script has been removed")]
fn script_removed(#[from(workspace)] workspace: &Workspace) {
    assert!(!workspace.layout.schema_script().path().exists());
}

#[then("the schema script created the table transport_lines")]
fn script_created_table(#[from(runner)] runner: &RefCell<RecordingRunner>) {
    let calls = runner.borrow().calls_to("spatialite");
    let script = calls
        .first()
        .and_then(|call| call.stdin_contents.clone())
        .expect("schema script was captured");
    assert!(
        script.contains(
            r#"CREATE TABLE "transport_lines" AS SELECT * FROM "lines" WHERE ("highway" = 'primary');"#
        ),
        "unexpected script: {script}"
    );
    assert!(script.contains("gpkgAddSpatialIndex('transport_lines', 'geom')"));
}

#[then("the converter exports only transport_lines")]
fn exports_theme_layers(#[from(converter)] converter: &RefCell<Option<Converter>>) {
    let layers = with_converter(converter, |active| active.layers().to_vec());
    assert_eq!(layers, ["transport_lines"]);
}

#[then("both archives list the same files")]
fn archives_match(#[from(archives)] archives: &RefCell<Vec<String>>) {
    let listings = archives.borrow();
    assert_eq!(listings.len(), 2);
    assert_eq!(listings.first(), listings.last());
    assert!(listings.first().is_some_and(|listing| listing.contains(".shp")));
}

#[then("the shapefile directory has been removed")]
fn shapefile_removed(#[from(workspace)] workspace: &Workspace) {
    assert!(!workspace.shapefile().exists());
}

#[then("zip ran exactly once")]
fn zip_once(#[from(runner)] runner: &RefCell<RecordingRunner>) {
    assert_eq!(runner.borrow().calls_to("zip").len(), 1);
}

#[then("conversion fails carrying the stderr \"Unable to open datasource\"")]
fn conversion_fails(#[from(outcome)] outcome: &StageCell) {
    let borrowed = outcome.borrow();
    let err = borrowed
        .as_ref()
        .expect("conversion ran")
        .as_ref()
        .expect_err("conversion should fail");
    assert!(matches!(err, ThematicError::Conversion { .. }), "unexpected error: {err}");
    assert_eq!(
        err.tool_error().and_then(ToolError::stderr),
        Some("Unable to open datasource")
    );
}

macro_rules! register_scenario {
    ($fn_name:ident, $title:literal) => {
        #[scenario(path = "tests/features/thematic_conversion.feature", name = $title)]
        fn $fn_name(
            workspace: Workspace,
            tags: RefCell<Vec<CategorisedTag>>,
            runner: RefCell<RecordingRunner>,
            converter: RefCell<Option<Converter>>,
            outcome: StageCell,
            archives: RefCell<Vec<String>>,
        ) {
            let _ = (workspace, tags, runner, converter, outcome, archives);
        }
    };
}

register_scenario!(schema_without_tags, "generating a schema without categorised tags");
register_scenario!(schema_from_tags, "generating theme tables from categorised tags");
register_scenario!(archiving_twice, "archiving twice");
register_scenario!(failing_conversion, "surfacing a failing conversion");

#[test]
fn scenario_titles_follow_feature_order() {
    let feature = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/features/thematic_conversion.feature");
    let contents = fs::read_to_string(&feature).unwrap_or_else(|err| {
        panic!("failed to read feature file {feature:?}: {err}");
    });
    let titles: Vec<&str> = contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Scenario: "))
        .collect();
    assert_eq!(
        titles,
        [
            "generating a schema without categorised tags",
            "generating theme tables from categorised tags",
            "archiving twice",
            "surfacing a failing conversion",
        ]
    );
}
