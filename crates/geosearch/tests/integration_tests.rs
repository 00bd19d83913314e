//! Integration tests for geosearch
//!
//! These tests drive the public API end to end: build an index from a small
//! GeoNames-shaped dump into a temporary data directory, then open it and
//! query it the way an application would.

use std::path::Path;

use geosearch::data_processing::test_data::{
    SAMPLE_FEATURE_CODES_JSON, TestDataConfig, create_test_data, record_line, write_lines,
};
use geosearch::data_processing::{feature_codes_path, index_dir};
use geosearch::{
    BuildMode, BuildOptions, GeoSearch, MatchTier, PlaceIndex, SearchConfig, SearchConfigBuilder,
};
use tempfile::TempDir;

fn setup_test_env() {
    let _ = geosearch::init_logging(tracing::Level::WARN);
}

fn small_options() -> BuildOptions {
    BuildOptions::builder()
        .batch_size(100)
        .writer_memory_bytes(15_000_000)
        .build()
        .expect("Options should be valid")
}

/// A data directory holding a built sample index and the feature-code table.
fn built_data_dir() -> TempDir {
    let dir = TempDir::new().expect("Should create temp dir");
    let (dump, _codes) =
        create_test_data(&TestDataConfig::sample()).expect("Should create test data");
    std::fs::write(feature_codes_path(dir.path()), SAMPLE_FEATURE_CODES_JSON)
        .expect("Should write feature codes");

    let outcome = GeoSearch::build(dir.path(), dump.path(), &small_options(), &())
        .expect("Build should succeed");
    assert_eq!(outcome.records, 266);
    dir
}

#[test]
fn test_open_without_index() {
    setup_test_env();

    let dir = TempDir::new().unwrap();
    let err = GeoSearch::open(dir.path()).expect_err("Nothing was built");
    assert!(err.is_index_not_found());
    assert!(!PlaceIndex::exists(&index_dir(dir.path())));
}

#[test]
fn test_full_workflow() {
    setup_test_env();

    let dir = built_data_dir();
    let engine = GeoSearch::open(dir.path()).expect("Should open the built index");
    assert_eq!(engine.index().num_docs(), 266);

    // 1. Exact name search with hierarchy and descriptions
    let results = engine
        .find("San Francisco", &SearchConfig::default())
        .expect("Search should work");
    let top = &results[0].place;
    assert_eq!(top.record.id, "5391959");
    assert_eq!(
        top.feature_code_short.as_deref(),
        Some("seat of a second-order administrative division")
    );
    let names: Vec<&str> = top.hierarchy.levels().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["California", "City and County of San Francisco"]);

    // 2. Typos fall through to the fuzzy tiers
    let detailed = engine
        .find_detailed("Californa", &SearchConfig::default())
        .expect("Fuzzy search should work");
    assert_eq!(detailed.tier, Some(MatchTier::SingleFuzzy));
    assert_eq!(detailed.results[0].place.record.name, "California");

    // 3. Exact-only searches never fall through
    let exact = SearchConfigBuilder::exact_only().build();
    assert!(engine.find("Californa", &exact).unwrap().is_empty());

    // 4. Position search, nearest first
    let nearby = engine
        .find_position(48.8534, 2.3487, &SearchConfig::default())
        .expect("Position search should work");
    assert_eq!(nearby[0].place.record.name, "Département de Paris");
    assert_eq!(nearby[1].place.record.name, "Paris");
    assert!(nearby[0].score > nearby[1].score);

    // 5. Lookup by id
    let lake = engine.get("5400229").expect("Lookup should work");
    assert_eq!(lake.len(), 1);
    assert_eq!(lake[0].feature_class_descr.as_deref(), Some("stream, lake, ..."));
}

#[test]
fn test_invalid_arguments() {
    setup_test_env();

    let dir = built_data_dir();
    let engine = GeoSearch::open(dir.path()).unwrap();

    let config = SearchConfig::builder().max_fuzzy_distance(3).build();
    let err = engine.find("Paris", &config).expect_err("Distance 3 is out of range");
    assert!(err.is_invalid_argument());

    let config = SearchConfig::builder().bbox_half_width(-1.0).build();
    let err = engine
        .find_position(0.0, 0.0, &config)
        .expect_err("Negative half width is out of range");
    assert!(err.is_invalid_argument());

    let err = BuildOptions::builder()
        .batch_size(0)
        .build()
        .expect_err("Empty batches are rejected");
    assert!(err.is_invalid_argument());
}

#[test]
fn test_append_and_reload() {
    setup_test_env();

    let dir = built_data_dir();
    let engine = GeoSearch::open(dir.path()).unwrap();
    assert!(engine.find("Ravenholm", &SearchConfig::default()).unwrap().is_empty());

    let extra = write_lines(&[
        record_line(
            "7000001",
            "Ravenholm",
            45.0,
            5.0,
            ("P", "PPL"),
            "FR",
            ["11", "", "", ""],
        ),
        // an id already in the index; add-only keeps both copies
        record_line(
            "5400229",
            "Lake Tahoe",
            39.1,
            -120.0,
            ("H", "LK"),
            "US",
            ["CA", "", "", ""],
        ),
    ])
    .unwrap();
    let options = BuildOptions::builder()
        .mode(BuildMode::Append)
        .writer_memory_bytes(15_000_000)
        .build()
        .unwrap();
    GeoSearch::build(dir.path(), extra.path(), &options, &()).expect("Append should succeed");

    // the open engine only sees the new commit after a reload
    assert!(engine.find("Ravenholm", &SearchConfig::default()).unwrap().is_empty());
    engine.reload().unwrap();

    let results = engine.find("Ravenholm", &SearchConfig::default()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].place.hierarchy.admin1.as_ref().map(|s| s.name.as_str()),
        Some("Île-de-France")
    );
    assert_eq!(engine.get("5400229").unwrap().len(), 2);
}

#[test]
fn test_build_sources_skips_malformed_files() {
    setup_test_env();

    let dir = TempDir::new().unwrap();
    let (good, _codes) = create_test_data(&TestDataConfig::minimal()).unwrap();
    let (bad, _codes) = create_test_data(&TestDataConfig {
        filler_rows: 0,
        trailing_malformed_line: true,
    })
    .unwrap();
    let sources: [&Path; 2] = [bad.path(), good.path()];

    let report = GeoSearch::build_sources(dir.path(), &sources, &small_options(), &())
        .expect("Malformed files are skipped, not fatal");
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, bad.path());
    assert_eq!(report.indexed.len(), 1);
    assert_eq!(report.records(), 16);

    let engine = GeoSearch::open(dir.path()).unwrap();
    // no feature-code file in this data directory
    let results = engine.find("Parma", &SearchConfig::default()).unwrap();
    assert_eq!(results[0].place.feature_class_descr, None);
    assert_eq!(results[0].place.feature_code_short.as_deref(), Some(""));
}

#[test]
fn test_result_json_shape() {
    setup_test_env();

    let dir = built_data_dir();
    let engine = GeoSearch::open(dir.path()).unwrap();
    let results = engine.find("Parma", &SearchConfig::default()).unwrap();

    let json = serde_json::to_value(&results[0]).expect("Results serialize");
    let place = &json["place"];
    assert_eq!(place["id"], "3171457");
    assert_eq!(place["country_code"], "IT");
    assert_eq!(place["feature_class_descr"], "city, village,...");
    assert_eq!(place["admin1"]["name"], "Emilia-Romagna");
    assert!(place["admin1"].get("feature_code").is_none());
    assert!(place.get("admin2").is_none());
}
