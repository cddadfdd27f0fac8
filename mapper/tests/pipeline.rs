//! End-to-end runs against a temporary config and source tree.

use productmap::{run, ConfigError, ConfigPaths, PipelineError, RunOptions};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCHEMA: [&str; 8] = [
    "Handle",
    "Title",
    "Body (HTML)",
    "Vendor",
    "Variant SKU",
    "Variant Price",
    "Variant Inventory Qty",
    "Image Src",
];

const SOURCE: &str = "Artikelnummer;Productname;Preis\n\
                      abc;Nordic Parka;199,00\n\
                      ;;10,00\n\
                      xyz;Trail Boots;89,00\n";

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

/// Config, statics, related dataset, images and source under `root`.
fn fixture(root: &Path, operator: &str, repeat_key: bool) {
    let config = root.join("config");
    let statics = root.join("statics");
    let images = root.join("images");
    for dir in [&config, &statics, &images] {
        fs::create_dir_all(dir).unwrap();
    }

    write_json(&config.join("destination-schema.json"), &json!(SCHEMA));
    write_json(
        &config.join("csv-static-mappings.json"),
        &json!({ "Vendor": "Acme", "Body (HTML)": "ext:body.html" }),
    );
    write_json(
        &config.join("csv-field-mappings.json"),
        &json!({
            "Artikelnummer": "Variant SKU",
            "Productname": "Title",
            "Preis": "Variant Price",
            "Bestand": "Variant Inventory Qty"
        }),
    );
    write_json(&config.join("csv-list-mappings.json"), &json!({}));
    write_json(
        &config.join("csv-additional-related-mapping.json"),
        &json!([{
            "related-data-file": root.join("stock.csv"),
            "related-data-file-id-column": "id",
            "matching-rule-in-main": { "column": "Artikelnummer", "operator": operator }
        }]),
    );
    write_json(
        &config.join("csv-derived-columns.json"),
        &json!({
            "handle": { "source": "Productname", "column": "Handle" },
            "images": {
                "source": "Productname",
                "directory": images,
                "column": "Image Src",
                "repeat_key": repeat_key
            }
        }),
    );

    fs::write(statics.join("body.html"), "<p>Warm</p>").unwrap();
    fs::write(root.join("stock.csv"), "id;Bestand\nabc123;5\nxyz;7\n").unwrap();
    for name in ["Parka_2.jpg", "Parka_3.jpg", "Parka_1.jpg"] {
        fs::write(images.join(name), b"").unwrap();
    }
    fs::write(root.join("source.csv"), SOURCE).unwrap();
}

fn options(root: &Path, out: &str, row_limit: usize) -> RunOptions {
    let mut options = RunOptions::new(root.join("source.csv"), root.join(out).join("products.csv"));
    options.image_path = Some("https://cdn.example/".into());
    options.image_field = Some("Image Src".into());
    options.config = ConfigPaths::new(root.join("config"), root.join("statics"));
    options.row_limit = row_limit;
    options
}

fn read_unit(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (headers, rows)
}

fn all_rows(units: &[PathBuf]) -> Vec<Vec<String>> {
    units.iter().flat_map(|unit| read_unit(unit).1).collect()
}

fn blank() -> Vec<String> {
    vec![String::new(); SCHEMA.len()]
}

fn image_only(image: &str) -> Vec<String> {
    let mut row = blank();
    row[7] = image.to_string();
    row
}

#[test]
fn test_maps_source_end_to_end() {
    let dir = TempDir::new().unwrap();
    fixture(dir.path(), "contains", false);

    let summary = run(&options(dir.path(), "dist", 2)).unwrap();

    assert_eq!(summary.seen, 3);
    assert_eq!(summary.accepted, 2);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.rows_emitted, 5);
    // the empty Artikelnummer is contained in every id, so all three records join
    assert_eq!(summary.join_hits, 3);
    assert_eq!(summary.join_misses, 0);
    // Bestand is missing from every source row, the other three from the stock rows
    assert_eq!(summary.skipped_mappings, 12);

    // 5 rows at 2 per unit
    assert_eq!(summary.units.len(), 3);
    for (n, unit) in summary.units.iter().enumerate() {
        assert_eq!(unit.file_name().unwrap(), format!("products_{}.csv", n + 1).as_str());
        let (headers, rows) = read_unit(unit);
        assert_eq!(headers, SCHEMA);
        assert!(rows.len() <= 2);
    }

    let rows = all_rows(&summary.units);
    let expected = vec![
        blank(),
        image_only("https://cdn.example/Parka_3.jpg"),
        image_only("https://cdn.example/Parka_2.jpg"),
        vec![
            "nordic-parka".to_string(),
            "Nordic Parka".into(),
            "<p>Warm</p>".into(),
            "Acme".into(),
            "abc".into(),
            "199,00".into(),
            "5".into(),
            "https://cdn.example/Parka_1.jpg".into(),
        ],
        vec![
            "trail-boots".to_string(),
            "Trail Boots".into(),
            "<p>Warm</p>".into(),
            "Acme".into(),
            "xyz".into(),
            "89,00".into(),
            "7".into(),
            String::new(),
        ],
    ];
    assert_eq!(rows, expected);
}

#[test]
fn test_static_fields_on_every_primary_row() {
    let dir = TempDir::new().unwrap();
    fixture(dir.path(), "contains", false);

    let summary = run(&options(dir.path(), "dist", 400)).unwrap();
    let primaries: Vec<Vec<String>> = all_rows(&summary.units)
        .into_iter()
        .filter(|row| !row[1].is_empty())
        .collect();

    assert_eq!(primaries.len(), summary.accepted);
    for row in primaries {
        assert_eq!(row[2], "<p>Warm</p>");
        assert_eq!(row[3], "Acme");
    }
}

#[test]
fn test_rejected_record_contributes_no_rows() {
    let dir = TempDir::new().unwrap();
    fixture(dir.path(), "contains", false);

    let summary = run(&options(dir.path(), "dist", 400)).unwrap();
    let rows = all_rows(&summary.units);
    assert!(rows.iter().all(|row| row[5] != "10,00"));
}

#[test]
fn test_equal_operator_needs_exact_id() {
    let dir = TempDir::new().unwrap();
    fixture(dir.path(), "equal", false);

    let summary = run(&options(dir.path(), "dist", 400)).unwrap();
    assert_eq!(summary.join_hits, 1);
    assert_eq!(summary.join_misses, 2);

    let rows = all_rows(&summary.units);
    let parka = rows.iter().find(|row| row[1] == "Nordic Parka").unwrap();
    assert_eq!(parka[6], "");
    let boots = rows.iter().find(|row| row[1] == "Trail Boots").unwrap();
    assert_eq!(boots[6], "7");
}

#[test]
fn test_repeat_key_on_continuation_rows() {
    let dir = TempDir::new().unwrap();
    fixture(dir.path(), "contains", true);

    let summary = run(&options(dir.path(), "dist", 400)).unwrap();
    let rows = all_rows(&summary.units);

    // Parka: 4 handles and 3 images give 5 rows, Boots: 1 handle gives 2
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[0], blank());
    assert_eq!(rows[1][0], "nordic-parka");
    assert_eq!(rows[1][7], "");
    assert_eq!(rows[2][0], "nordic-parka");
    assert_eq!(rows[2][7], "https://cdn.example/Parka_3.jpg");
    assert_eq!(rows[4][1], "Nordic Parka");
    assert_eq!(rows[5], blank());
    assert_eq!(rows[6][0], "trail-boots");
}

#[test]
fn test_runs_are_byte_identical() {
    let dir = TempDir::new().unwrap();
    fixture(dir.path(), "contains", true);

    let first = run(&options(dir.path(), "first", 3)).unwrap();
    let second = run(&options(dir.path(), "second", 3)).unwrap();

    assert_eq!(first.units.len(), second.units.len());
    for (a, b) in first.units.iter().zip(&second.units) {
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }
}

#[test]
fn test_config_error_writes_nothing() {
    let dir = TempDir::new().unwrap();
    fixture(dir.path(), "contains", false);
    fs::remove_file(dir.path().join("config/csv-field-mappings.json")).unwrap();

    let err = run(&options(dir.path(), "dist", 400)).unwrap_err();
    assert!(matches!(err, PipelineError::Config(ConfigError::Missing { .. })));
    assert!(!dir.path().join("dist").exists());
}

#[test]
fn test_missing_source_is_an_error() {
    let dir = TempDir::new().unwrap();
    fixture(dir.path(), "contains", false);
    fs::remove_file(dir.path().join("source.csv")).unwrap();

    let err = run(&options(dir.path(), "dist", 400)).unwrap_err();
    assert!(matches!(err, PipelineError::Csv(_)));
}
