//! `facets.toml` handling and its effect on browsing

use crate::common::*;
use strata_facets::types::CONFIG_FILE_NAME;
use strata_facets::{
    BrowseRequest, BrowseSelection, FacetBrowser, FacetConfig, FacetError, GeoUnit,
};
use tempfile::TempDir;

#[test]
fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    let config = FacetConfig {
        max_items_per_doc: 16,
        or_threshold: 3,
        prefilter_max_selectivity: 0.1,
        geo_unit: GeoUnit::Miles,
        ..FacetConfig::default()
    };
    config.write_to_file(&path).unwrap();
    assert_eq!(FacetConfig::from_file(&path).unwrap(), config);
}

#[test]
fn test_default_file_written_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    FacetConfig::write_default_if_missing(&path).unwrap();
    assert_eq!(FacetConfig::from_file(&path).unwrap(), FacetConfig::default());

    std::fs::write(&path, "or_threshold = 9\n").unwrap();
    FacetConfig::write_default_if_missing(&path).unwrap();
    assert_eq!(FacetConfig::from_file(&path).unwrap().or_threshold, 9);
}

#[test]
fn test_invalid_config_names_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "selectivity_clamp = 1.5\n").unwrap();
    match FacetConfig::from_file(&path) {
        Err(FacetError::InvalidConfig(msg)) => assert!(msg.contains(CONFIG_FILE_NAME), "{}", msg),
        other => panic!("expected InvalidConfig, got {:?}", other),
    }
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = FacetConfig::from_file(&dir.path().join(CONFIG_FILE_NAME)).unwrap_err();
    assert!(matches!(err, FacetError::Io(_)));
}

#[test]
fn test_tuning_does_not_change_results() {
    init_tracing();
    let rows = catalog(200);
    let request = BrowseRequest::new()
        .with_window(0, usize::MAX)
        .with_selection(BrowseSelection::new("color").with_value("red").with_value("black"))
        .with_selection(BrowseSelection::new("tag").with_value("eco"));

    let tunings = [
        FacetConfig::default(),
        FacetConfig {
            or_threshold: 1,
            prefilter_max_selectivity: 0.0,
            ..FacetConfig::default()
        },
        FacetConfig {
            or_threshold: 100,
            adaptive_posting_ratio: 1.0,
            prefilter_max_selectivity: 1.0,
            ..FacetConfig::default()
        },
    ];
    let expected = naive_hits(&rows, |r| {
        matches!(r.color, Some("red") | Some("black")) && r.tags.contains(&"eco")
    });
    for config in tunings {
        let browser = FacetBrowser::new(segment(0, &rows), handlers(&config), config.clone());
        let result = browser.browse(&request).unwrap();
        assert_eq!(hit_docs(&result), expected, "config {:?}", config);
    }
}
