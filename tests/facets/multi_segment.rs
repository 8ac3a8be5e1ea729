//! Fan-out across segments and merged facet counts

use crate::common::*;
use strata_facets::{
    BrowseHit, BrowseRequest, BrowseSelection, FacetBrowser, FacetConfig, FacetSortOrder,
    FacetSpec, MultiFacetBrowser,
};

fn request() -> BrowseRequest {
    BrowseRequest::new()
        .with_selection(BrowseSelection::new("tag").with_value("sale"))
        .with_facet_spec("color", FacetSpec::new().with_order(FacetSortOrder::HitsDescending))
        .with_facet_spec("tag", FacetSpec::new())
        .with_facet_spec("size_range", FacetSpec::new())
        .with_facet_spec("near", FacetSpec::new())
}

#[test]
fn test_split_segments_match_single_segment() {
    init_tracing();
    let rows = catalog(300);
    let config = FacetConfig::default();
    let handlers = handlers(&config);

    let single = FacetBrowser::new(segment(0, &rows), handlers.clone(), config.clone())
        .browse(&request())
        .unwrap();
    let multi = MultiFacetBrowser::new(segments(&rows, 64), handlers, config);
    assert_eq!(multi.num_segments(), 5);
    let merged = multi.browse(&request()).unwrap();

    assert_eq!(merged.num_hits, single.num_hits);
    for facet in ["color", "tag", "size_range", "near"] {
        assert_eq!(merged.facet(facet), single.facet(facet), "facet {}", facet);
    }
}

#[test]
fn test_hits_ordered_by_segment_then_doc() {
    let rows = catalog(100);
    let config = FacetConfig::default();
    let multi = MultiFacetBrowser::new(segments(&rows, 30), handlers(&config), config);

    let all = multi
        .browse(&request().with_window(0, usize::MAX))
        .unwrap();
    let expected: Vec<BrowseHit> = naive_hits(&rows, |r| r.tags.contains(&"sale"))
        .into_iter()
        .map(|doc| BrowseHit {
            segment_id: doc as u64 / 30,
            doc: doc % 30,
        })
        .collect();
    assert_eq!(all.hits, expected);

    let window = multi.browse(&request().with_window(3, 4)).unwrap();
    assert_eq!(window.hits, expected[3..7].to_vec());
    assert_eq!(window.num_hits, expected.len());
}

#[test]
fn test_duplicated_segments_double_counts() {
    let rows = catalog(150);
    let config = FacetConfig::default();
    let handlers = handlers(&config);
    let once = MultiFacetBrowser::new(vec![segment(0, &rows)], handlers.clone(), config.clone())
        .browse(&request())
        .unwrap();
    let twice = MultiFacetBrowser::new(vec![segment(0, &rows), segment(1, &rows)], handlers, config)
        .browse(&request())
        .unwrap();

    assert_eq!(twice.num_hits, once.num_hits * 2);
    let once_colors = once.facet("color");
    let twice_colors = twice.facet("color");
    assert_eq!(once_colors.len(), twice_colors.len());
    for (a, b) in once_colors.iter().zip(twice_colors) {
        assert_eq!(a.value, b.value);
        assert_eq!(a.hit_count * 2, b.hit_count);
    }
}

#[test]
fn test_empty_browser() {
    let config = FacetConfig::default();
    let multi = MultiFacetBrowser::new(Vec::new(), handlers(&config), config);
    let result = multi.browse(&request()).unwrap();
    assert_eq!(result.num_hits, 0);
    assert!(result.hits.is_empty());
    assert!(result.facets.is_empty());
}
