//! Shared segments under parallel access

use crate::common::*;
use std::sync::{Arc, Barrier};
use std::thread;
use strata_facets::{
    BrowseRequest, BrowseSelection, CancelToken, FacetBrowser, FacetConfig, FacetError,
    FacetSegment, FacetSpec, MemorySegment,
};

#[test]
fn test_parallel_browses_share_one_build() {
    init_tracing();
    let rows = Arc::new(catalog(500));
    let config = FacetConfig::default();
    let browser = FacetBrowser::new(segment(7, &rows), handlers(&config), config);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let browser = browser.clone();
            let barrier = barrier.clone();
            let rows = rows.clone();
            thread::spawn(move || {
                let color = COLORS[i % COLORS.len()];
                let request = BrowseRequest::new()
                    .with_window(0, usize::MAX)
                    .with_selection(BrowseSelection::new("color").with_value(color))
                    .with_facet_spec("tag", FacetSpec::new());
                barrier.wait();
                let result = browser.browse(&request).unwrap();
                let expected = naive_hits(&rows, |r| r.color == Some(color));
                assert_eq!(hit_docs(&result), expected);
                assert_eq!(facet_counts(&result, "tag"), naive_counts(&rows, &expected, tags_of));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        browser.segment().loaded_facets(),
        vec!["color".to_string(), "tag".to_string()]
    );
}

#[test]
fn test_warm_builds_every_facet() {
    let rows = catalog(50);
    let config = FacetConfig::default();
    let browser = FacetBrowser::new(segment(0, &rows), handlers(&config), config);
    browser.warm().unwrap();
    let loaded = browser.segment().loaded_facets();
    for facet in ["color", "geo", "lat", "lon", "size", "tag", "tag_bits"] {
        assert!(loaded.iter().any(|f| f == facet), "{} not built: {:?}", facet, loaded);
    }
}

#[test]
fn test_cancelled_segment_fails_builds() {
    let mut reader = MemorySegment::new(0, 2);
    reader.add(0, "color", "red").add(1, "color", "blue");
    let token = CancelToken::new();
    let segment = Arc::new(FacetSegment::new(Arc::new(reader)).with_cancel_token(token.clone()));
    let config = FacetConfig::default();
    let browser = FacetBrowser::new(segment, handlers(&config), config);

    token.cancel();
    let request = BrowseRequest::new().with_facet_spec("color", FacetSpec::new());
    let err = browser.browse(&request).unwrap_err();
    assert!(
        matches!(&err, FacetError::Load { facet, source } if facet == "color" && matches!(**source, FacetError::Cancelled)),
        "{:?}",
        err
    );
    assert!(browser.segment().loaded_facets().is_empty());
}
