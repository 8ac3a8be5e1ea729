//! Browse orchestration
//!
//! `FacetBrowser` answers a `BrowseRequest` against one segment:
//!
//! ```text
//! BrowseRequest
//!      │
//!      ▼
//! selections ──► per-facet filters ──┬─ expanded facets (kept aside)
//!                                    └─ selectivity split
//!                                         ├─ prefilters  ─► drive iteration
//!                                         └─ postfilters ─► checked per doc
//!      │
//!      ▼
//! per doc: hits + facet collectors ──► SegmentBrowse ──► ranked BrowseResult
//! ```
//!
//! A facet counted with `expand_selection` is counted as if its own selection
//! were absent: a document failing only that facet's selection is not a hit
//! but still counts toward that facet.
//!
//! `MultiFacetBrowser` runs the same per-segment browse on every segment in
//! parallel and merges the partial results.

use crate::collector::FacetCountCollector;
use crate::handler::{FacetHandler, FacetHandlers};
use crate::merge::merge_facets;
use crate::spec::{BrowseFacet, BrowseHit, BrowseRequest, BrowseResult, FacetSpec};
use facets_core::{DocId, FacetConfig, FacetError, FacetResult, NO_MORE_DOCS};
use facets_filter::{
    AndFilter, DocIdSet, DocIdSetIterator, Filter, RandomAccessAndFilter, RandomAccessDocIdSet,
    RandomAccessFilter, RandomAccessFilterAdapter,
};
use facets_index::FacetSegment;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Unranked outcome of a browse over one segment
#[derive(Debug, Clone, Default)]
pub struct SegmentBrowse {
    /// Segment browsed
    pub segment_id: u64,
    /// Total matching documents in the segment
    pub num_hits: usize,
    /// Leading matching documents, at most the requested limit
    pub hits: Vec<DocId>,
    /// Every value of each counted facet with its count, in value order
    pub facets: BTreeMap<String, Vec<BrowseFacet>>,
}

struct CountedFacet<'a> {
    name: &'a str,
    collector: Box<dyn FacetCountCollector>,
}

// ============================================================================
// FacetBrowser
// ============================================================================

/// Browser over a single segment
#[derive(Clone)]
pub struct FacetBrowser {
    segment: Arc<FacetSegment>,
    handlers: Arc<FacetHandlers>,
    config: FacetConfig,
}

impl FacetBrowser {
    /// Browser over `segment` with the facets of `handlers`
    pub fn new(segment: Arc<FacetSegment>, handlers: Arc<FacetHandlers>, config: FacetConfig) -> Self {
        Self {
            segment,
            handlers,
            config,
        }
    }

    /// Segment browsed
    pub fn segment(&self) -> &FacetSegment {
        &self.segment
    }

    /// Build the data of every registered facet
    pub fn warm(&self) -> FacetResult<()> {
        self.handlers.warm(&self.segment)
    }

    /// Browse the segment and rank facets per the request's specs
    ///
    /// # Errors
    ///
    /// Returns `UnknownFacet` if a selection names an unregistered facet,
    /// and propagates facet data build failures.
    pub fn browse(&self, request: &BrowseRequest) -> FacetResult<BrowseResult> {
        let partial = self.browse_segment(request, request.offset.saturating_add(request.count))?;
        Ok(finish(vec![partial], request, &self.handlers))
    }

    /// Browse the segment without ranking, keeping at most `limit` hits
    ///
    /// Facet lists hold every value with its raw count, so partial results of
    /// several segments can be merged before the facet specs are applied.
    pub fn browse_segment(&self, request: &BrowseRequest, limit: usize) -> FacetResult<SegmentBrowse> {
        let segment = self.segment.as_ref();

        let mut by_facet: BTreeMap<&str, Vec<Arc<dyn RandomAccessFilter>>> = BTreeMap::new();
        for selection in &request.selections {
            let handler = self.handler(selection.facet())?;
            if let Some(filter) = handler.selection_filter(selection)? {
                by_facet.entry(selection.facet()).or_default().push(filter);
            }
        }

        let mut counted = Vec::with_capacity(request.facet_specs.len());
        for name in request.facet_specs.keys() {
            match self.handlers.get(name) {
                Some(handler) => counted.push(CountedFacet {
                    name: name.as_str(),
                    collector: handler.collector(segment)?,
                }),
                None => warn!(
                    target: "strata::facets",
                    facet = name.as_str(),
                    "Skipping facet spec without a handler"
                ),
            }
        }

        let mut expanded: Vec<(&str, Box<dyn RandomAccessDocIdSet>)> = Vec::new();
        let mut prefilters: Vec<Arc<dyn RandomAccessFilter>> = Vec::new();
        let mut postfilters: Vec<Box<dyn RandomAccessDocIdSet>> = Vec::new();
        for (facet, filters) in by_facet {
            let filter = RandomAccessAndFilter::combine(filters);
            let expand = request
                .facet_specs
                .get(facet)
                .map_or(false, |spec| spec.expand_selection);
            if expand {
                expanded.push((facet, filter.random_access_doc_id_set(segment)?));
            } else if filter.selectivity(segment)? <= self.config.prefilter_max_selectivity {
                prefilters.push(filter);
            } else {
                postfilters.push(filter.random_access_doc_id_set(segment)?);
            }
        }
        debug!(
            target: "strata::facets",
            segment = segment.segment_id(),
            prefilters = prefilters.len(),
            postfilters = postfilters.len(),
            expanded = expanded.len(),
            "Planned facet browse"
        );

        let mut driver: Vec<Arc<dyn Filter>> = Vec::with_capacity(2);
        if let Some(filter) = &request.filter {
            driver.push(filter.clone());
        }
        if !prefilters.is_empty() {
            driver.push(Arc::new(RandomAccessFilterAdapter(RandomAccessAndFilter::combine(
                prefilters,
            ))));
        }
        let driver = AndFilter::combine(driver).doc_id_set(segment)?;

        let mut result = SegmentBrowse {
            segment_id: segment.segment_id(),
            ..SegmentBrowse::default()
        };
        let mut iter = driver.iterator();
        loop {
            let doc = iter.next_doc();
            if doc == NO_MORE_DOCS {
                break;
            }
            if !postfilters.iter().all(|set| set.get(doc)) {
                continue;
            }
            let mut missed = None;
            let mut misses = 0;
            for (facet, set) in &expanded {
                if !set.get(doc) {
                    misses += 1;
                    missed = Some(*facet);
                }
            }
            match (misses, missed) {
                (0, _) => {
                    result.num_hits += 1;
                    if result.hits.len() < limit {
                        result.hits.push(doc);
                    }
                    for facet in &mut counted {
                        facet.collector.collect(doc);
                    }
                }
                (1, Some(only)) => {
                    for facet in counted.iter_mut().filter(|f| f.name == only) {
                        facet.collector.collect(doc);
                    }
                }
                _ => {}
            }
        }

        result.facets = counted
            .into_iter()
            .map(|facet| (facet.name.to_string(), facet.collector.counts()))
            .collect();
        Ok(result)
    }

    fn handler(&self, facet: &str) -> FacetResult<&Arc<dyn FacetHandler>> {
        self.handlers
            .get(facet)
            .ok_or_else(|| FacetError::UnknownFacet(facet.to_string()))
    }
}

impl std::fmt::Debug for FacetBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacetBrowser")
            .field("segment", &self.segment.segment_id())
            .field("handlers", &self.handlers)
            .finish()
    }
}

// ============================================================================
// MultiFacetBrowser
// ============================================================================

/// Browser over several segments
///
/// Segments are browsed in parallel on the rayon pool; hits are ordered by
/// segment id, then document.
#[derive(Debug, Clone)]
pub struct MultiFacetBrowser {
    browsers: Vec<FacetBrowser>,
    handlers: Arc<FacetHandlers>,
}

impl MultiFacetBrowser {
    /// Browser over `segments` with the facets of `handlers`
    pub fn new(segments: Vec<Arc<FacetSegment>>, handlers: Arc<FacetHandlers>, config: FacetConfig) -> Self {
        let browsers = segments
            .into_iter()
            .map(|segment| FacetBrowser::new(segment, handlers.clone(), config.clone()))
            .collect();
        Self { browsers, handlers }
    }

    /// Number of segments
    pub fn num_segments(&self) -> usize {
        self.browsers.len()
    }

    /// Build the data of every registered facet in every segment
    pub fn warm(&self) -> FacetResult<()> {
        self.browsers.par_iter().try_for_each(FacetBrowser::warm)
    }

    /// Browse all segments and merge their results
    ///
    /// # Errors
    ///
    /// Fails if any segment fails; see [`FacetBrowser::browse`].
    pub fn browse(&self, request: &BrowseRequest) -> FacetResult<BrowseResult> {
        let limit = request.offset.saturating_add(request.count);
        let partials = self
            .browsers
            .par_iter()
            .map(|browser| browser.browse_segment(request, limit))
            .collect::<FacetResult<Vec<_>>>()?;
        debug!(
            target: "strata::facets",
            segments = partials.len(),
            "Merging segment browse results"
        );
        Ok(finish(partials, request, &self.handlers))
    }
}

/// Window the hits and rank the merged facet counts of `partials`
fn finish(mut partials: Vec<SegmentBrowse>, request: &BrowseRequest, handlers: &FacetHandlers) -> BrowseResult {
    partials.sort_by_key(|p| p.segment_id);

    let num_hits = partials.iter().map(|p| p.num_hits).sum();
    let hits = partials
        .iter()
        .flat_map(|p| {
            p.hits.iter().map(move |&doc| BrowseHit {
                segment_id: p.segment_id,
                doc,
            })
        })
        .skip(request.offset)
        .take(request.count)
        .collect();

    let mut lists: BTreeMap<String, Vec<Vec<BrowseFacet>>> = BTreeMap::new();
    for partial in partials {
        for (facet, counts) in partial.facets {
            lists.entry(facet).or_default().push(counts);
        }
    }
    let default_spec = FacetSpec::default();
    let facets = lists
        .into_iter()
        .filter_map(|(facet, lists)| {
            let handler = handlers.get(&facet)?;
            let spec = request.facet_specs.get(&facet).unwrap_or(&default_spec);
            let ranked = merge_facets(lists, spec, &|a: &str, b: &str| handler.compare_values(a, b));
            Some((facet, ranked))
        })
        .collect();

    BrowseResult {
        num_hits,
        hits,
        facets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{MultiValueFacetHandler, RangeFacetHandler, SimpleFacetHandler};
    use crate::spec::{BrowseSelection, FacetSortOrder, ValueOperation};
    use facets_core::ValueKind;
    use facets_filter::TermFilter;
    use facets_index::{MemorySegment, SingleValueSource};

    // doc  color  size  tags
    //  0   red    1     pet, small
    //  1   red    2     pet
    //  2   blue   3     small
    //  3   green  4     -
    //  4   blue   5     pet, large
    //  5   green  6     large
    //  6   red    7     small
    fn colors(id: u64) -> Arc<FacetSegment> {
        let mut seg = MemorySegment::new(id, 7);
        let rows: [(&str, &[&str]); 7] = [
            ("red", &["pet", "small"]),
            ("red", &["pet"]),
            ("blue", &["small"]),
            ("green", &[]),
            ("blue", &["pet", "large"]),
            ("green", &["large"]),
            ("red", &["small"]),
        ];
        for (doc, (color, tags)) in rows.iter().enumerate() {
            let doc = doc as DocId;
            let size = (doc + 1).to_string();
            seg.add(doc, "color", color).add(doc, "size", &size);
            if !tags.is_empty() {
                seg.add_values(doc, "tag", tags);
            }
        }
        Arc::new(FacetSegment::new(Arc::new(seg)))
    }

    fn handlers() -> Arc<FacetHandlers> {
        let ranges = vec!["[* TO 3]".to_string(), "[4 TO 5]".to_string(), "[6 TO *]".to_string()];
        let size_range = RangeFacetHandler::new(
            "size_range",
            SingleValueSource::new("size", "size", ValueKind::Int),
            ranges,
        )
        .unwrap();
        Arc::new(
            FacetHandlers::new()
                .with(SimpleFacetHandler::new("color", "color", ValueKind::String))
                .with(SimpleFacetHandler::new("size", "size", ValueKind::Int))
                .with(MultiValueFacetHandler::new("tag", "tag", ValueKind::String))
                .with(size_range),
        )
    }

    fn browser() -> FacetBrowser {
        FacetBrowser::new(colors(0), handlers(), FacetConfig::default())
    }

    fn docs(result: &BrowseResult) -> Vec<DocId> {
        result.hits.iter().map(|h| h.doc).collect()
    }

    fn pairs(result: &BrowseResult, facet: &str) -> Vec<(String, u64)> {
        result
            .facet(facet)
            .iter()
            .map(|f| (f.value.clone(), f.hit_count))
            .collect()
    }

    fn owned(entries: &[(&str, u64)]) -> Vec<(String, u64)> {
        entries.iter().map(|&(v, n)| (v.to_string(), n)).collect()
    }

    #[test]
    fn test_browse_without_selection() {
        let request = BrowseRequest::new().with_facet_spec("color", FacetSpec::new());
        let result = browser().browse(&request).unwrap();
        assert_eq!(result.num_hits, 7);
        assert_eq!(
            pairs(&result, "color"),
            owned(&[("blue", 2), ("green", 2), ("red", 3)])
        );
    }

    #[test]
    fn test_browse_selection() {
        let request = BrowseRequest::new()
            .with_selection(BrowseSelection::new("color").with_value("red"))
            .with_facet_spec("color", FacetSpec::new())
            .with_facet_spec("tag", FacetSpec::new());
        let result = browser().browse(&request).unwrap();
        assert_eq!(docs(&result), vec![0, 1, 6]);
        assert_eq!(pairs(&result, "color"), owned(&[("red", 3)]));
        assert_eq!(pairs(&result, "tag"), owned(&[("pet", 2), ("small", 2)]));
    }

    #[test]
    fn test_expand_selection_counts_siblings() {
        let request = BrowseRequest::new()
            .with_selection(BrowseSelection::new("color").with_value("red"))
            .with_facet_spec("color", FacetSpec::new().with_expand_selection(true))
            .with_facet_spec("tag", FacetSpec::new());
        let result = browser().browse(&request).unwrap();
        assert_eq!(docs(&result), vec![0, 1, 6]);
        assert_eq!(
            pairs(&result, "color"),
            owned(&[("blue", 2), ("green", 2), ("red", 3)])
        );
        // Other facets only see real hits
        assert_eq!(pairs(&result, "tag"), owned(&[("pet", 2), ("small", 2)]));
    }

    #[test]
    fn test_expand_selection_respects_other_selections() {
        let request = BrowseRequest::new()
            .with_selection(BrowseSelection::new("color").with_value("red"))
            .with_selection(BrowseSelection::new("tag").with_value("pet"))
            .with_facet_spec("color", FacetSpec::new().with_expand_selection(true));
        let result = browser().browse(&request).unwrap();
        assert_eq!(docs(&result), vec![0, 1]);
        // Pets: 0 red, 1 red, 4 blue
        assert_eq!(pairs(&result, "color"), owned(&[("blue", 1), ("red", 2)]));
    }

    #[test]
    fn test_tag_operations() {
        let browser = browser();
        let and = BrowseRequest::new().with_selection(
            BrowseSelection::new("tag")
                .with_value("pet")
                .with_value("small")
                .with_operation(ValueOperation::And),
        );
        assert_eq!(docs(&browser.browse(&and).unwrap()), vec![0]);

        let or = BrowseRequest::new()
            .with_selection(BrowseSelection::new("tag").with_value("pet").with_value("small"));
        assert_eq!(docs(&browser.browse(&or).unwrap()), vec![0, 1, 2, 4, 6]);
    }

    #[test]
    fn test_not_value_keeps_missing_docs() {
        let request = BrowseRequest::new()
            .with_selection(BrowseSelection::new("tag").with_not_value("pet"));
        assert_eq!(docs(&browser().browse(&request).unwrap()), vec![2, 3, 5, 6]);
    }

    #[test]
    fn test_range_facet() {
        let request = BrowseRequest::new()
            .with_selection(BrowseSelection::new("color").with_value("red"))
            .with_facet_spec("size_range", FacetSpec::new().with_min_hit_count(0));
        let result = browser().browse(&request).unwrap();
        assert_eq!(
            pairs(&result, "size_range"),
            owned(&[("[* TO 3]", 2), ("[4 TO 5]", 0), ("[6 TO *]", 1)])
        );

        let select = BrowseRequest::new()
            .with_selection(BrowseSelection::new("size_range").with_value("[4 TO 5]"));
        assert_eq!(docs(&browser().browse(&select).unwrap()), vec![3, 4]);
    }

    #[test]
    fn test_facet_spec_ordering_and_limit() {
        let spec = FacetSpec::new()
            .with_order(FacetSortOrder::HitsDescending)
            .with_max_count(2);
        let request = BrowseRequest::new().with_facet_spec("color", spec);
        let result = browser().browse(&request).unwrap();
        // blue and green tie at 2; value order breaks the tie
        assert_eq!(pairs(&result, "color"), owned(&[("red", 3), ("blue", 2)]));
    }

    #[test]
    fn test_search_filter_restricts_hits() {
        let request = BrowseRequest::new()
            .with_filter(Arc::new(TermFilter::new("color", "blue")))
            .with_facet_spec("tag", FacetSpec::new());
        let result = browser().browse(&request).unwrap();
        assert_eq!(docs(&result), vec![2, 4]);
        assert_eq!(
            pairs(&result, "tag"),
            owned(&[("large", 1), ("pet", 1), ("small", 1)])
        );
    }

    #[test]
    fn test_hit_window() {
        let request = BrowseRequest::new().with_window(2, 3);
        let result = browser().browse(&request).unwrap();
        assert_eq!(result.num_hits, 7);
        assert_eq!(docs(&result), vec![2, 3, 4]);
    }

    #[test]
    fn test_unknown_facets() {
        let request = BrowseRequest::new().with_selection(BrowseSelection::new("shape").with_value("round"));
        let err = browser().browse(&request).unwrap_err();
        assert!(matches!(err, FacetError::UnknownFacet(ref name) if name == "shape"));

        let request = BrowseRequest::new().with_facet_spec("shape", FacetSpec::new());
        let result = browser().browse(&request).unwrap();
        assert!(result.facet("shape").is_empty());
        assert_eq!(result.num_hits, 7);
    }

    #[test]
    fn test_prefilter_and_postfilter_agree() {
        let request = BrowseRequest::new()
            .with_selection(BrowseSelection::new("color").with_value("red"))
            .with_selection(BrowseSelection::new("size").with_value("7"));
        let all_pre = FacetConfig {
            prefilter_max_selectivity: 1.0,
            ..FacetConfig::default()
        };
        let all_post = FacetConfig {
            prefilter_max_selectivity: 0.0,
            ..FacetConfig::default()
        };
        let pre = FacetBrowser::new(colors(0), handlers(), all_pre);
        let post = FacetBrowser::new(colors(0), handlers(), all_post);
        assert_eq!(docs(&pre.browse(&request).unwrap()), vec![6]);
        assert_eq!(docs(&post.browse(&request).unwrap()), vec![6]);
    }

    #[test]
    fn test_multi_segment_browse() {
        let browser = MultiFacetBrowser::new(vec![colors(2), colors(1)], handlers(), FacetConfig::default());
        browser.warm().unwrap();
        let request = BrowseRequest::new()
            .with_selection(BrowseSelection::new("color").with_value("red"))
            .with_facet_spec("tag", FacetSpec::new())
            .with_window(2, 2);
        let result = browser.browse(&request).unwrap();
        assert_eq!(result.num_hits, 6);
        assert_eq!(
            result.hits,
            vec![
                BrowseHit { segment_id: 1, doc: 6 },
                BrowseHit { segment_id: 2, doc: 0 },
            ]
        );
        assert_eq!(result.hit_count("tag", "pet"), 4);
        assert_eq!(result.hit_count("tag", "small"), 4);
    }

    #[test]
    fn test_multi_segment_min_hit_count_on_totals() {
        let browser = MultiFacetBrowser::new(vec![colors(0), colors(1)], handlers(), FacetConfig::default());
        let request = BrowseRequest::new().with_facet_spec("color", FacetSpec::new().with_min_hit_count(5));
        let result = browser.browse(&request).unwrap();
        assert_eq!(pairs(&result, "color"), owned(&[("red", 6)]));
    }
}
