//! Single-segment browse against brute-force answers

use crate::common::*;
use strata_facets::{
    BrowseFacet, BrowseRequest, BrowseSelection, FacetBrowser, FacetConfig, FacetError, FacetSortOrder,
    FacetSpec, TermFilter, ValueOperation,
};
use std::sync::Arc;

fn browser(rows: &[Row]) -> FacetBrowser {
    init_tracing();
    let config = FacetConfig::default();
    FacetBrowser::new(segment(0, rows), handlers(&config), config)
}

fn all_hits() -> BrowseRequest {
    BrowseRequest::new().with_window(0, usize::MAX)
}

#[test]
fn test_no_selection_counts_whole_segment() {
    let rows = catalog(200);
    let request = all_hits()
        .with_facet_spec("color", FacetSpec::new())
        .with_facet_spec("tag", FacetSpec::new());
    let result = browser(&rows).browse(&request).unwrap();

    let everything = naive_hits(&rows, |_| true);
    assert_eq!(result.num_hits, 200);
    assert_eq!(hit_docs(&result), everything);
    assert_eq!(facet_counts(&result, "color"), naive_counts(&rows, &everything, color_of));
    assert_eq!(facet_counts(&result, "tag"), naive_counts(&rows, &everything, tags_of));
}

#[test]
fn test_or_selection_with_tag() {
    let rows = catalog(200);
    let request = all_hits()
        .with_selection(BrowseSelection::new("color").with_value("red").with_value("blue"))
        .with_selection(BrowseSelection::new("tag").with_value("pet"))
        .with_facet_spec("color", FacetSpec::new())
        .with_facet_spec("tag", FacetSpec::new());
    let result = browser(&rows).browse(&request).unwrap();

    let expected = naive_hits(&rows, |r| {
        matches!(r.color, Some("red") | Some("blue")) && r.tags.contains(&"pet")
    });
    assert!(!expected.is_empty());
    assert_eq!(hit_docs(&result), expected);
    assert_eq!(result.num_hits, expected.len());
    assert_eq!(facet_counts(&result, "color"), naive_counts(&rows, &expected, color_of));
    assert_eq!(facet_counts(&result, "tag"), naive_counts(&rows, &expected, tags_of));
}

#[test]
fn test_and_selection_and_exclusion() {
    let rows = catalog(200);
    let request = all_hits()
        .with_selection(
            BrowseSelection::new("tag")
                .with_value("eco")
                .with_value("sale")
                .with_operation(ValueOperation::And)
                .with_not_value("new"),
        )
        .with_selection(BrowseSelection::new("color").with_not_value("white"));
    let result = browser(&rows).browse(&request).unwrap();

    let expected = naive_hits(&rows, |r| {
        r.tags.contains(&"eco")
            && r.tags.contains(&"sale")
            && !r.tags.contains(&"new")
            && r.color != Some("white")
    });
    assert_eq!(hit_docs(&result), expected);
}

#[test]
fn test_expand_selection_counts_as_if_unselected() {
    let rows = catalog(200);
    let selection = BrowseSelection::new("color").with_value("black");
    let tag = BrowseSelection::new("tag").with_value("wide");

    let expanded = all_hits()
        .with_selection(selection)
        .with_selection(tag.clone())
        .with_facet_spec("color", FacetSpec::new().with_expand_selection(true));
    let without_color = all_hits()
        .with_selection(tag)
        .with_facet_spec("color", FacetSpec::new());

    let browser = browser(&rows);
    let result = browser.browse(&expanded).unwrap();
    let reference = browser.browse(&without_color).unwrap();

    assert_eq!(
        hit_docs(&result),
        naive_hits(&rows, |r| r.color == Some("black") && r.tags.contains(&"wide"))
    );
    assert_eq!(facet_counts(&result, "color"), facet_counts(&reference, "color"));
}

#[test]
fn test_search_filter_and_selection() {
    let rows = catalog(120);
    let request = all_hits()
        .with_filter(Arc::new(TermFilter::new("tag", "new")))
        .with_selection(BrowseSelection::new("color").with_value("blue"))
        .with_facet_spec("tag", FacetSpec::new());
    let result = browser(&rows).browse(&request).unwrap();

    let expected = naive_hits(&rows, |r| r.tags.contains(&"new") && r.color == Some("blue"));
    assert_eq!(hit_docs(&result), expected);
    assert_eq!(facet_counts(&result, "tag"), naive_counts(&rows, &expected, tags_of));
}

#[test]
fn test_hits_descending_with_limit() {
    let rows = catalog(200);
    let spec = FacetSpec::new()
        .with_order(FacetSortOrder::HitsDescending)
        .with_max_count(3);
    let result = browser(&rows)
        .browse(&BrowseRequest::new().with_facet_spec("size", spec))
        .unwrap();

    let facets = result.facet("size");
    assert_eq!(facets.len(), 3);
    assert!(facets.windows(2).all(|w| w[0].hit_count >= w[1].hit_count));
}

#[test]
fn test_custom_order_breaks_ties_by_value() {
    let rows = catalog(40);
    // Every count compares equal, so value order decides
    let spec = FacetSpec::new().with_order(FacetSortOrder::Custom(Arc::new(
        |_: &BrowseFacet, _: &BrowseFacet| std::cmp::Ordering::Equal,
    )));
    let result = browser(&rows)
        .browse(&BrowseRequest::new().with_facet_spec("size", spec))
        .unwrap();

    let sizes: Vec<i32> = result
        .facet("size")
        .iter()
        .map(|f| f.value.parse().unwrap())
        .collect();
    let mut sorted = sizes.clone();
    sorted.sort_unstable();
    assert_eq!(sizes, sorted);
}

#[test]
fn test_unknown_selection_facet() {
    let rows = catalog(10);
    let request = BrowseRequest::new().with_selection(BrowseSelection::new("brand").with_value("acme"));
    let err = browser(&rows).browse(&request).unwrap_err();
    assert!(matches!(err, FacetError::UnknownFacet(_)));
    assert!(err.is_usage_error());
}

#[test]
fn test_selecting_absent_value_matches_nothing() {
    let rows = catalog(50);
    let request = BrowseRequest::new()
        .with_selection(BrowseSelection::new("color").with_value("purple"))
        .with_facet_spec("color", FacetSpec::new());
    let result = browser(&rows).browse(&request).unwrap();
    assert_eq!(result.num_hits, 0);
    assert!(result.facet("color").is_empty());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_browse_matches_brute_force(
            colors in proptest::sample::subsequence(COLORS.to_vec(), 1..=3),
            tag in proptest::sample::select(TAGS.to_vec()),
            exclude in proptest::sample::select(TAGS.to_vec()),
            n in 1usize..150,
        ) {
            let rows = catalog(n);
            let mut selection = BrowseSelection::new("color");
            for color in &colors {
                selection = selection.with_value(*color);
            }
            let request = all_hits()
                .with_selection(selection)
                .with_selection(BrowseSelection::new("tag").with_value(tag).with_not_value(exclude))
                .with_facet_spec("tag", FacetSpec::new());
            let result = browser(&rows).browse(&request).unwrap();

            let expected = naive_hits(&rows, |r| {
                r.color.map_or(false, |c| colors.contains(&c))
                    && r.tags.contains(&tag)
                    && !r.tags.contains(&exclude)
            });
            prop_assert_eq!(hit_docs(&result), expected.clone());
            prop_assert_eq!(facet_counts(&result, "tag"), naive_counts(&rows, &expected, tags_of));
        }
    }
}
