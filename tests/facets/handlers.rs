//! Range, compact and geo facets end to end

use crate::common::*;
use strata_facets::{
    BrowseRequest, BrowseSelection, FacetBrowser, FacetConfig, FacetSpec, GeoUnit, ValueOperation,
};

fn browser_with(rows: &[Row], config: FacetConfig) -> FacetBrowser {
    init_tracing();
    FacetBrowser::new(segment(0, rows), handlers(&config), config)
}

fn browser(rows: &[Row]) -> FacetBrowser {
    browser_with(rows, FacetConfig::default())
}

fn all_hits() -> BrowseRequest {
    BrowseRequest::new().with_window(0, usize::MAX)
}

#[test]
fn test_size_range_counts() {
    let rows = catalog(200);
    let request = all_hits()
        .with_selection(BrowseSelection::new("color").with_value("white"))
        .with_facet_spec("size_range", FacetSpec::new().with_min_hit_count(0));
    let result = browser(&rows).browse(&request).unwrap();

    let hits = naive_hits(&rows, |r| r.color == Some("white"));
    let count = |pred: &dyn Fn(i32) -> bool| {
        hits.iter().filter(|&&d| pred(rows[d as usize].size)).count() as u64
    };
    assert_eq!(result.hit_count("size_range", "[* TO 5]"), count(&|s| s <= 5));
    assert_eq!(result.hit_count("size_range", "[6 TO 12]"), count(&|s| (6..=12).contains(&s)));
    assert_eq!(result.hit_count("size_range", "(12 TO *]"), count(&|s| s > 12));

    // Predefined order, not string order
    let labels: Vec<&str> = result.facet("size_range").iter().map(|f| f.value.as_str()).collect();
    assert_eq!(labels, SIZE_RANGES.to_vec());
}

#[test]
fn test_size_range_selection() {
    let rows = catalog(200);
    let request = all_hits().with_selection(
        BrowseSelection::new("size_range")
            .with_value("[* TO 5]")
            .with_value("(12 TO *]"),
    );
    let result = browser(&rows).browse(&request).unwrap();
    assert_eq!(
        hit_docs(&result),
        naive_hits(&rows, |r| r.size <= 5 || r.size > 12)
    );
}

#[test]
fn test_compact_facet_matches_multi_value_facet() {
    let rows = catalog(200);
    let browser = browser(&rows);
    for operation in [ValueOperation::Or, ValueOperation::And] {
        let select = |facet: &str| {
            all_hits()
                .with_selection(
                    BrowseSelection::new(facet)
                        .with_value("new")
                        .with_value("sale")
                        .with_operation(operation)
                        .with_not_value("eco"),
                )
                .with_facet_spec(facet, FacetSpec::new())
        };
        let multi = browser.browse(&select("tag")).unwrap();
        let compact = browser.browse(&select("tag_bits")).unwrap();
        assert_eq!(hit_docs(&multi), hit_docs(&compact));
        assert_eq!(facet_counts(&multi, "tag"), facet_counts(&compact, "tag_bits"));
    }
}

#[test]
fn test_geo_circles() {
    let rows = catalog(200);
    let request = all_hits().with_facet_spec("near", FacetSpec::new().with_min_hit_count(0));
    let result = browser(&rows).browse(&request).unwrap();

    let at_origin = naive_hits(&rows, |r| r.location == Some((37.0, -122.0)));
    let located = naive_hits(&rows, |r| r.location.is_some());
    assert!(!at_origin.is_empty());
    assert_eq!(result.hit_count("near", "<37.0, -122.0, 5>"), at_origin.len() as u64);
    assert_eq!(result.hit_count("near", "<37.4, -122.3, 200>"), located.len() as u64);

    let select = all_hits().with_selection(BrowseSelection::new("near").with_value("<37.0, -122.0, 5>"));
    assert_eq!(hit_docs(&browser(&rows).browse(&select).unwrap()), at_origin);
}

#[test]
fn test_geo_boxes_agree_with_circles() {
    let rows = catalog(200);
    let browser = browser(&rows);
    for range in ["<37.0, -122.0, 5>", "<37.4, -122.3, 200>"] {
        let circle = browser
            .browse(&all_hits().with_selection(BrowseSelection::new("near").with_value(range)))
            .unwrap();
        let rect = browser
            .browse(&all_hits().with_selection(BrowseSelection::new("near_box").with_value(range)))
            .unwrap();
        assert_eq!(hit_docs(&circle), hit_docs(&rect), "range {}", range);
    }
}

#[test]
fn test_geo_small_radii_keep_the_centre() {
    let rows = catalog(200);
    let browser = browser(&rows);
    let at_origin = naive_hits(&rows, |r| r.location == Some((37.0, -122.0)));
    assert!(!at_origin.is_empty());
    for radius in ["0", "0.1", "0.5"] {
        let range = format!("<37.0, -122.0, {}>", radius);
        for facet in ["near", "near_box"] {
            let result = browser
                .browse(&all_hits().with_selection(BrowseSelection::new(facet).with_value(&range)))
                .unwrap();
            assert_eq!(hit_docs(&result), at_origin, "{} {}", facet, range);
        }
    }
}

#[test]
fn test_geo_radius_in_miles() {
    let rows = catalog(200);
    let miles = FacetConfig {
        geo_unit: GeoUnit::Miles,
        ..FacetConfig::default()
    };
    // 5 miles is about 8 km, still short of the nearest neighbouring point
    let request = all_hits().with_selection(BrowseSelection::new("near").with_value("<37.0, -122.0, 5>"));
    let result = browser_with(&rows, miles).browse(&request).unwrap();
    assert_eq!(
        hit_docs(&result),
        naive_hits(&rows, |r| r.location == Some((37.0, -122.0)))
    );
}
