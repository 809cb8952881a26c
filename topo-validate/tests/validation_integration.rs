//! Tests d'intégration de bout en bout sur une source GeoPackage
//!
//! Un GeoPackage de fixture est construit sur disque, la validation
//! complète est exécutée dessus, puis les sorties sont relues avec le
//! store pour vérifier couches, colonnes et estampilles.

use std::path::Path;

use geo::{polygon, Geometry, LineString, Point};
use tempfile::TempDir;

use topo_validate::config::{self, Settings};
use topo_validate::output::gpkg::GpkgWriter;
use topo_validate::output::{Column, ColumnKind, ErrorLayer, ErrorRow};
use topo_validate::store::FeatureStore;
use topo_validate::ValidationController;
use topofilter::Value;

fn text_column(name: &str) -> Column {
    Column {
        name: name.to_string(),
        kind: ColumnKind::Text,
    }
}

fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
    Geometry::Polygon(polygon![
        (x: x0, y: y0),
        (x: x0 + size, y: y0),
        (x: x0 + size, y: y0 + size),
        (x: x0, y: y0 + size),
        (x: x0, y: y0),
    ])
}

fn row(geometry: Geometry<f64>, values: Vec<Value>) -> ErrorRow {
    ErrorRow { geometry, values }
}

/// Construit la source de test :
/// - `lakes` : deux polygones qui se recouvrent (aire commune 1.0) et un isolé
/// - `roads` : quatre lignes, noms manquants sur r2, r3 et r4
/// - `hydrants` : un point dans `parcels`, un point dehors
/// - `parcels` : un polygone de référence
fn build_fixture(path: &Path) {
    let mut writer = GpkgWriter::open(path).unwrap();

    writer
        .write_layer(&ErrorLayer {
            name: "lakes".to_string(),
            srid: 2193,
            columns: vec![
                text_column("topo_id"),
                text_column("name"),
                text_column("feature_type"),
            ],
            rows: vec![
                row(
                    square(0.0, 0.0, 2.0),
                    vec![
                        Value::Text("A".into()),
                        Value::Text("Lake A".into()),
                        Value::Text("lake".into()),
                    ],
                ),
                row(
                    square(1.0, 1.0, 2.0),
                    vec![
                        Value::Text("B".into()),
                        Value::Text("Lake B".into()),
                        Value::Text("lake".into()),
                    ],
                ),
                row(
                    square(10.0, 10.0, 1.0),
                    vec![
                        Value::Text("C".into()),
                        Value::Text("Lake C".into()),
                        Value::Text("lake".into()),
                    ],
                ),
            ],
        })
        .unwrap();

    writer
        .write_layer(&ErrorLayer {
            name: "roads".to_string(),
            srid: 2193,
            columns: vec![
                text_column("topo_id"),
                text_column("name"),
                text_column("surface"),
            ],
            rows: vec![
                row(
                    Geometry::LineString(LineString::from(vec![(0.0, 0.0), (5.0, 0.0)])),
                    vec![
                        Value::Text("R1".into()),
                        Value::Text("Main Road".into()),
                        Value::Text("sealed".into()),
                    ],
                ),
                row(
                    Geometry::LineString(LineString::from(vec![(0.0, 1.0), (5.0, 1.0)])),
                    vec![
                        Value::Text("R2".into()),
                        Value::Null,
                        Value::Text("sealed".into()),
                    ],
                ),
                row(
                    Geometry::LineString(LineString::from(vec![(0.0, 2.0), (5.0, 2.0)])),
                    vec![
                        Value::Text("R3".into()),
                        Value::Null,
                        Value::Text("gravel".into()),
                    ],
                ),
                row(
                    Geometry::LineString(LineString::from(vec![(0.0, 3.0), (5.0, 3.0)])),
                    vec![
                        Value::Text("R4".into()),
                        Value::Null,
                        Value::Text("sealed".into()),
                    ],
                ),
            ],
        })
        .unwrap();

    writer
        .write_layer(&ErrorLayer {
            name: "hydrants".to_string(),
            srid: 2193,
            columns: vec![text_column("topo_id"), text_column("name")],
            rows: vec![
                row(
                    Geometry::Point(Point::new(2.0, 2.0)),
                    vec![Value::Text("H1".into()), Value::Text("Hydrant 1".into())],
                ),
                row(
                    Geometry::Point(Point::new(50.0, 50.0)),
                    vec![Value::Text("H2".into()), Value::Text("Hydrant 2".into())],
                ),
            ],
        })
        .unwrap();

    writer
        .write_layer(&ErrorLayer {
            name: "parcels".to_string(),
            srid: 2193,
            columns: vec![text_column("topo_id")],
            rows: vec![row(square(0.0, 0.0, 5.0), vec![Value::Text("P1".into())])],
        })
        .unwrap();
}

fn settings_for(source: &Path, output: &Path) -> Settings {
    Settings {
        source: source.to_str().unwrap().to_string(),
        output_dir: output.to_path_buf(),
        export_parquet: true,
        ..Settings::default()
    }
}

const RULES: &str = r#"{
    "null_columns": [
        {"table": "roads", "column": "name", "where": "surface = 'sealed'",
         "message": "road name missing"}
    ],
    "query_rules": [
        {"table": "roads", "column": "surface", "rule": "surface = 'gravel'",
         "message": "gravel surface not allowed"}
    ],
    "feature_not_on_layers": [
        {"table": "hydrants", "intersection_table": "parcels",
         "message": "hydrant outside parcels"}
    ],
    "self_intersect_layers": [
        {"table": "lakes", "layername": "lakes", "message": "lake overlap"}
    ]
}"#;

#[tokio::test]
async fn test_full_validation_run() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("fixture.gpkg");
    let out = dir.path().join("out");
    build_fixture(&source);

    let rules_path = dir.path().join("rules.json");
    std::fs::write(&rules_path, RULES).unwrap();
    let rules = config::load_rules(&rules_path).unwrap();

    let report = ValidationController::run(settings_for(&source, &out), rules)
        .await
        .unwrap();

    assert!(report.is_flagged("null_columns"));
    assert!(report.is_flagged("query_rules"));
    assert!(report.is_flagged("feature_not_on_layers"));
    assert!(report.is_flagged("self_intersect_layers"));
    assert!(!report.is_flagged("feature_in_layers"));
    assert!(!report.is_flagged("line_not_on_feature_layers"));
    assert!(!report.is_flagged("evaluation_errors"));

    assert!(out.join("topology_null.gpkg").is_file());
    assert!(out.join("topology_query.gpkg").is_file());
    assert!(out.join("topology_not_intersect.gpkg").is_file());
    assert!(out.join("topology_self_intersect.gpkg").is_file());
    assert!(out.join("lakes_topology_self_intersect.parquet").is_file());
    assert!(out.join("validation_summary_report.json").is_file());

    // Colonnes nulles : R2 et R4 (R3 exclue par le where)
    let store = FeatureStore::open(out.join("topology_null.gpkg").to_str().unwrap())
        .await
        .unwrap();
    let nulls = store.read("roads_null_name", None, None).await.unwrap();
    assert_eq!(nulls.len(), 2);
    assert_eq!(
        nulls.features[0].attribute_text("warning").as_deref(),
        Some("road name missing")
    );
    assert_eq!(nulls.features[0].attribute("open"), Some(&Value::Int(1)));

    // Règle de requête : R3 seulement
    let store = FeatureStore::open(out.join("topology_query.gpkg").to_str().unwrap())
        .await
        .unwrap();
    let queries = store.read("roads_query_surface", None, None).await.unwrap();
    assert_eq!(queries.len(), 1);

    // Relation : H2 hors parcelle
    let store = FeatureStore::open(out.join("topology_not_intersect.gpkg").to_str().unwrap())
        .await
        .unwrap();
    let flagged = store
        .read("hydrants_not_intersect_parcels", None, None)
        .await
        .unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(
        flagged.features[0].attribute_text("topo_id").as_deref(),
        Some("H2")
    );
    assert_eq!(
        flagged.features[0].attribute_text("name").as_deref(),
        Some("Hydrant 2")
    );

    // Recouvrement : aire commune de 1.0 entre A et B, identité portée
    let store = FeatureStore::open(out.join("topology_self_intersect.gpkg").to_str().unwrap())
        .await
        .unwrap();
    let overlaps = store.read("lakes_errors_areas", None, None).await.unwrap();
    assert_eq!(overlaps.len(), 1);
    let entry = &overlaps.features[0];
    assert_eq!(entry.attribute_text("pair_keys").as_deref(), Some("A-B"));
    assert_eq!(
        entry.attribute_text("pair_names").as_deref(),
        Some("Lake A-Lake B")
    );
    match entry.attribute("Area") {
        Some(Value::Float(area)) => assert!((area - 1.0).abs() < 1e-9, "area={}", area),
        other => panic!("expected Area, got {:?}", other),
    }
}

#[tokio::test]
async fn test_source_reads_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("fixture.gpkg");
    build_fixture(&source);

    let store = FeatureStore::open(source.to_str().unwrap()).await.unwrap();
    let first = store.read("lakes", None, None).await.unwrap();
    let second = store.read("lakes", None, None).await.unwrap();

    assert_eq!(first.len(), second.len());
    let ids = |c: &topo_validate::store::feature::FeatureCollection| {
        c.features.iter().map(|f| f.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn test_rerun_replaces_previous_outputs() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("fixture.gpkg");
    let out = dir.path().join("out");
    build_fixture(&source);

    let rules_path = dir.path().join("rules.json");
    std::fs::write(&rules_path, RULES).unwrap();

    for _ in 0..2 {
        let rules = config::load_rules(&rules_path).unwrap();
        ValidationController::run(settings_for(&source, &out), rules)
            .await
            .unwrap();
    }

    // Pas d'append entre deux exécutions : le répertoire est nettoyé
    let store = FeatureStore::open(out.join("topology_null.gpkg").to_str().unwrap())
        .await
        .unwrap();
    let nulls = store.read("roads_null_name", None, None).await.unwrap();
    assert_eq!(nulls.len(), 2);
}

#[tokio::test]
async fn test_clean_dataset_produces_empty_report() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("fixture.gpkg");
    let out = dir.path().join("out");
    build_fixture(&source);

    let rules_path = dir.path().join("rules.json");
    std::fs::write(
        &rules_path,
        r#"{
            "null_columns": [
                {"table": "roads", "column": "name", "where": "surface = 'concrete'"}
            ],
            "feature_in_layers": [
                {"table": "hydrants", "intersection_table": "parcels",
                 "where": "topo_id = 'H2'"}
            ]
        }"#,
    )
    .unwrap();
    let rules = config::load_rules(&rules_path).unwrap();

    let report = ValidationController::run(settings_for(&source, &out), rules)
        .await
        .unwrap();

    assert!(!report.any_flagged());
    assert!(!out.join("topology_null.gpkg").exists());
    assert!(!out.join("topology_intersect.gpkg").exists());

    let summary: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.join("validation_summary_report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(summary["null_columns"], serde_json::Value::Bool(false));
    assert_eq!(summary["feature_in_layers"], serde_json::Value::Bool(false));
}

#[tokio::test]
async fn test_missing_table_flips_evaluation_errors() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("fixture.gpkg");
    let out = dir.path().join("out");
    build_fixture(&source);

    let rules_path = dir.path().join("rules.json");
    std::fs::write(
        &rules_path,
        r#"{"null_columns": [{"table": "no_such_table", "column": "name"}]}"#,
    )
    .unwrap();
    let rules = config::load_rules(&rules_path).unwrap();

    let report = ValidationController::run(settings_for(&source, &out), rules)
        .await
        .unwrap();

    assert!(report.is_flagged("evaluation_errors"));
    assert!(!report.is_flagged("null_columns"));
}
