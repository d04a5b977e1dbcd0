use super::*;
use crate::tools::{ToolError, test_support::RecordingRunner};
use osm_export_core::GeometryType;
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Workspace {
    _temp: TempDir,
    root: Utf8PathBuf,
    layout: StagingLayout,
    geopackage: Utf8PathBuf,
}

impl Workspace {
    fn job(&self) -> ThematicJob {
        ThematicJob::new(
            self.geopackage.clone(),
            self.root.join("out/thematic_shp"),
            self.layout.clone(),
        )
    }
}

#[fixture]
fn workspace() -> Workspace {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp dir");
    let layout = StagingLayout::new(root.join("stage"), "kathmandu").expect("valid layout");
    osm_export_fs::ensure_dir(layout.directory()).expect("staging dir");
    osm_export_fs::ensure_dir(&root.join("out")).expect("output dir");
    let geopackage = root.join("source.gpkg");
    osm_export_fs::write_file(&geopackage, "not really a geo-package").expect("source");
    Workspace {
        _temp: temp,
        root,
        layout,
        geopackage,
    }
}

#[rstest]
fn construction_copies_the_geopackage(workspace: Workspace) {
    let converter = ThematicConverter::new(
        workspace.job(),
        RecordingRunner::new(),
        ToolPaths::default(),
    )
    .expect("valid job");

    assert_eq!(converter.state(), ThematicState::Pending);
    let working = converter.working_geopackage().path();
    assert_eq!(working, workspace.layout.thematic_geopackage().path());
    assert_eq!(
        osm_export_fs::read_to_string(working).expect("read copy"),
        "not really a geo-package"
    );
}

#[rstest]
fn missing_geopackage_is_a_configuration_error(workspace: Workspace) {
    let job = ThematicJob::new(
        workspace.root.join("absent.gpkg"),
        workspace.root.join("out/shp"),
        workspace.layout.clone(),
    );

    let err = ThematicConverter::new(job, RecordingRunner::new(), ToolPaths::default())
        .expect_err("missing input");

    assert!(matches!(
        err,
        ThematicError::Configuration(ConfigurationError::MissingInput { .. })
    ));
}

#[rstest]
fn directory_input_is_rejected(workspace: Workspace) {
    let job = ThematicJob::new(
        workspace.root.join("out"),
        workspace.root.join("out/shp"),
        workspace.layout.clone(),
    );

    let err = ThematicConverter::new(job, RecordingRunner::new(), ToolPaths::default())
        .expect_err("directory input");

    assert!(matches!(
        err,
        ThematicError::Configuration(ConfigurationError::UnexpectedInputKind { .. })
    ));
}

#[rstest]
fn missing_destination_parent_is_rejected(workspace: Workspace) {
    let job = ThematicJob::new(
        workspace.geopackage.clone(),
        workspace.root.join("nowhere/shp"),
        workspace.layout.clone(),
    );

    let err = ThematicConverter::new(job, RecordingRunner::new(), ToolPaths::default())
        .expect_err("missing parent");

    assert!(matches!(
        err,
        ThematicError::Configuration(ConfigurationError::MissingParentDirectory { .. })
    ));
}

#[rstest]
fn zero_tags_still_run_the_shell_once(workspace: Workspace) {
    let runner = RecordingRunner::new();
    let mut converter =
        ThematicConverter::new(workspace.job(), &runner, ToolPaths::default()).expect("valid job");

    converter.generate_thematic_schema().expect("empty schema");

    let calls = runner.calls_to("spatialite");
    assert_eq!(calls.len(), 1);
    let call = calls.first().expect("spatialite call");
    let script = workspace.layout.schema_script().into_path();
    assert_eq!(call.invocation.stdin(), Some(script.as_path()));
    assert_eq!(call.stdin_contents.as_deref(), Some(".bail on\nBEGIN;\nCOMMIT;\n"));
    assert!(!script.exists(), "script must be removed");
    assert_eq!(converter.state(), ThematicState::SchemaWritten);
}

#[rstest]
fn schema_failure_removes_script_and_keeps_stderr(workspace: Workspace) {
    let runner = RecordingRunner::new().failing("spatialite", 1, "no such function");
    let mut converter =
        ThematicConverter::new(workspace.job(), &runner, ToolPaths::default()).expect("valid job");

    let err = converter
        .generate_thematic_schema()
        .expect_err("shell fails");

    assert!(matches!(err, ThematicError::SchemaGeneration { .. }));
    assert_eq!(
        err.tool_error().and_then(ToolError::stderr),
        Some("no such function")
    );
    assert!(!workspace.layout.schema_script().path().exists());
    assert_eq!(converter.state(), ThematicState::Failed(Stage::Schema));
}

#[rstest]
fn tags_require_a_readable_geopackage(workspace: Workspace) {
    let job = workspace.job().with_tags([CategorisedTag::new(
        "Road", "highway", "primary", "transport",
    )
    .with_geometry(GeometryType::Line)]);
    let runner = RecordingRunner::new();
    let mut converter =
        ThematicConverter::new(job, &runner, ToolPaths::default()).expect("valid job");

    let err = converter
        .generate_thematic_schema()
        .expect_err("not a geo-package");

    assert!(matches!(err, ThematicError::Geopackage { .. }));
    assert!(runner.calls().is_empty());
}

#[rstest]
fn convert_forces_utf8_and_overwrite(workspace: Workspace) {
    let runner = RecordingRunner::materialising();
    let mut converter =
        ThematicConverter::new(workspace.job(), &runner, ToolPaths::default()).expect("valid job");

    let shapefile = converter.convert().expect("converted");

    let call = runner.calls_to("ogr2ogr").pop().expect("ogr2ogr call");
    assert_eq!(
        call.invocation.arguments(),
        [
            "-f".to_owned(),
            "ESRI Shapefile".to_owned(),
            shapefile.to_string(),
            workspace.layout.thematic_geopackage().path().to_string(),
            "-lco".to_owned(),
            "ENCODING=UTF-8".to_owned(),
            "-overwrite".to_owned(),
        ]
    );
    assert!(shapefile.join("points.shp").exists());
    assert_eq!(converter.state(), ThematicState::Converted);
}

#[rstest]
fn failed_conversion_leaves_no_directory(workspace: Workspace) {
    let runner = RecordingRunner::materialising().failing("ogr2ogr", 1, "unsupported layer");
    let mut converter =
        ThematicConverter::new(workspace.job(), &runner, ToolPaths::default()).expect("valid job");

    let err = converter.convert().expect_err("conversion fails");

    assert!(matches!(err, ThematicError::Conversion { .. }));
    assert!(!workspace.job().shapefile().exists());
}

#[rstest]
fn archive_is_idempotent(workspace: Workspace) {
    let runner = RecordingRunner::materialising();
    let mut converter =
        ThematicConverter::new(workspace.job(), &runner, ToolPaths::default()).expect("valid job");
    converter.convert().expect("converted");

    let first = converter.archive().expect("first archive");
    let listing = osm_export_fs::read_to_string(&first).expect("read archive");
    let second = converter.archive().expect("second archive");

    assert_eq!(first, second);
    assert_eq!(
        osm_export_fs::read_to_string(&second).expect("read archive"),
        listing
    );
    assert_eq!(runner.calls_to("zip").len(), 1);
    assert!(!workspace.job().shapefile().exists());
    assert_eq!(converter.state(), ThematicState::Archived);
}

#[rstest]
fn archive_without_output_fails(workspace: Workspace) {
    let mut converter = ThematicConverter::new(
        workspace.job(),
        RecordingRunner::new(),
        ToolPaths::default(),
    )
    .expect("valid job");

    let err = converter.archive().expect_err("nothing to archive");

    assert!(matches!(err, ThematicError::MissingShapefileDirectory { .. }));
}

#[rstest]
fn failed_archive_removes_partial_zip(workspace: Workspace) {
    let runner = RecordingRunner::materialising().failing("zip", 12, "zip error: nothing to do");
    let mut converter =
        ThematicConverter::new(workspace.job(), &runner, ToolPaths::default()).expect("valid job");
    converter.convert().expect("converted");

    let err = converter.archive().expect_err("archiver fails");

    assert!(matches!(err, ThematicError::Archive { .. }));
    assert!(!workspace.job().archive().exists());
    assert!(workspace.job().shapefile().exists());
}

#[rstest]
fn run_reports_each_stage(workspace: Workspace) {
    let runner = RecordingRunner::materialising();
    let job = workspace.job().with_zipped(true);
    let mut converter = ThematicConverter::new(job, &runner, ToolPaths::default()).expect("valid job");

    let results = converter.run();

    let stages: Vec<Stage> = results.iter().map(|result| result.stage).collect();
    assert_eq!(stages, [Stage::Schema, Stage::Convert, Stage::Archive]);
    assert!(results.iter().all(|result| result.succeeded));
    assert_eq!(runner.programs(), ["spatialite", "ogr2ogr", "zip"]);
}

#[rstest]
fn run_stops_at_first_failure(workspace: Workspace) {
    let runner = RecordingRunner::materialising().failing("spatialite", 1, "locked");
    let mut converter =
        ThematicConverter::new(workspace.job().with_zipped(true), &runner, ToolPaths::default())
            .expect("valid job");

    let results = converter.run();

    assert_eq!(results.len(), 1);
    let schema = results.first().expect("schema result");
    assert!(!schema.succeeded);
    assert!(
        schema
            .error_detail
            .as_deref()
            .is_some_and(|detail| detail.contains("locked"))
    );
}
