//! Facet count collectors
//!
//! A collector accumulates, for one facet of one segment, how many matching
//! documents hold each value. Value-indexed collectors count into a lazily
//! paged histogram so that a query touching few values allocates little.
//! `counts` reports every value in the facet's value order; ranking and
//! limits are applied afterwards from the facet spec.

use crate::spec::BrowseFacet;
use facets_core::DocId;
use facets_filter::RandomAccessDocIdSet;
use facets_index::{CompactFacetDataCache, FacetDataCache, MultiValueFacetDataCache, ValueStats};
use facets_storage::{BigSegmentedArray, LazyBigIntArray};
use std::sync::Arc;

/// Per-segment hit counter of one facet
pub trait FacetCountCollector: Send {
    /// Count the values of matching document `doc`
    fn collect(&mut self, doc: DocId);

    /// Every value of the facet with its hit count, in value order
    fn counts(&self) -> Vec<BrowseFacet>;
}

/// Entries `1..list.len()` of a value-indexed histogram
fn indexed_counts(stats: &dyn ValueStats, histogram: &LazyBigIntArray) -> Vec<BrowseFacet> {
    let list = stats.val_list();
    (1..list.len())
        .map(|index| BrowseFacet::new(list.get(index), histogram.get(index as DocId) as u64))
        .collect()
}

/// Single-valued facet collector
pub struct DefaultFacetCountCollector {
    cache: Arc<FacetDataCache>,
    histogram: LazyBigIntArray,
}

impl DefaultFacetCountCollector {
    /// Collector over `cache`
    pub fn new(cache: Arc<FacetDataCache>) -> Self {
        let histogram = LazyBigIntArray::new(cache.val_list().len());
        Self { cache, histogram }
    }
}

impl FacetCountCollector for DefaultFacetCountCollector {
    #[inline]
    fn collect(&mut self, doc: DocId) {
        self.histogram.increment(self.cache.value_index(doc));
    }

    fn counts(&self) -> Vec<BrowseFacet> {
        indexed_counts(self.cache.as_ref(), &self.histogram)
    }
}

/// Multi-valued facet collector
pub struct MultiValueFacetCountCollector {
    cache: Arc<MultiValueFacetDataCache>,
    histogram: LazyBigIntArray,
}

impl MultiValueFacetCountCollector {
    /// Collector over `cache`
    pub fn new(cache: Arc<MultiValueFacetDataCache>) -> Self {
        let histogram = LazyBigIntArray::new(cache.val_list().len());
        Self { cache, histogram }
    }
}

impl FacetCountCollector for MultiValueFacetCountCollector {
    #[inline]
    fn collect(&mut self, doc: DocId) {
        self.cache
            .nested_array()
            .count_no_return(doc, &mut self.histogram);
    }

    fn counts(&self) -> Vec<BrowseFacet> {
        indexed_counts(self.cache.as_ref(), &self.histogram)
    }
}

/// Compact multi-valued facet collector
pub struct CompactFacetCountCollector {
    cache: Arc<CompactFacetDataCache>,
    histogram: LazyBigIntArray,
}

impl CompactFacetCountCollector {
    /// Collector over `cache`
    pub fn new(cache: Arc<CompactFacetDataCache>) -> Self {
        let histogram = LazyBigIntArray::new(cache.val_list().len());
        Self { cache, histogram }
    }
}

impl FacetCountCollector for CompactFacetCountCollector {
    fn collect(&mut self, doc: DocId) {
        for index in self.cache.value_indices(doc) {
            self.histogram.increment(index as DocId);
        }
    }

    fn counts(&self) -> Vec<BrowseFacet> {
        indexed_counts(self.cache.as_ref(), &self.histogram)
    }
}

/// Predefined-range collector over a single-valued facet
///
/// Counts per value-index like `DefaultFacetCountCollector` and sums the
/// value-index span of each range when reporting.
pub struct RangeFacetCountCollector {
    cache: Arc<FacetDataCache>,
    histogram: LazyBigIntArray,
    ranges: Vec<(String, Option<(usize, usize)>)>,
}

impl RangeFacetCountCollector {
    /// Collector over `cache` reporting one entry per `(label, span)`
    pub fn new(cache: Arc<FacetDataCache>, ranges: Vec<(String, Option<(usize, usize)>)>) -> Self {
        let histogram = LazyBigIntArray::new(cache.val_list().len());
        Self {
            cache,
            histogram,
            ranges,
        }
    }
}

impl FacetCountCollector for RangeFacetCountCollector {
    #[inline]
    fn collect(&mut self, doc: DocId) {
        self.histogram.increment(self.cache.value_index(doc));
    }

    fn counts(&self) -> Vec<BrowseFacet> {
        self.ranges
            .iter()
            .map(|(label, span)| {
                let hits = span.map_or(0, |(start, end)| {
                    (start..=end)
                        .map(|i| self.histogram.get(i as DocId) as u64)
                        .sum()
                });
                BrowseFacet::new(label.clone(), hits)
            })
            .collect()
    }
}

/// Collector counting membership in a fixed list of doc id sets
///
/// Used by facets whose entries are predefined filters rather than values,
/// such as geo circles.
pub struct FilterFacetCountCollector {
    entries: Vec<(String, Box<dyn RandomAccessDocIdSet>)>,
    hits: Vec<u64>,
}

impl FilterFacetCountCollector {
    /// Collector with one entry per `(label, set)`
    pub fn new(entries: Vec<(String, Box<dyn RandomAccessDocIdSet>)>) -> Self {
        let hits = vec![0; entries.len()];
        Self { entries, hits }
    }
}

impl FacetCountCollector for FilterFacetCountCollector {
    fn collect(&mut self, doc: DocId) {
        for (hits, (_, set)) in self.hits.iter_mut().zip(&self.entries) {
            if set.get(doc) {
                *hits += 1;
            }
        }
    }

    fn counts(&self) -> Vec<BrowseFacet> {
        self.entries
            .iter()
            .zip(&self.hits)
            .map(|((label, _), &hits)| BrowseFacet::new(label.clone(), hits))
            .collect()
    }
}
