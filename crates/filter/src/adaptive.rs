//! Strategy switch between posting unions and value scans
//!
//! A facet filter scans the whole value-index array of a segment. When the
//! selected values are rare, unioning their postings from the search layer
//! touches far fewer documents. The adaptive filter looks at the value
//! frequencies and picks one or the other per segment.

use crate::docidset::{BitmapIterator, DocIdSet, DocIdSetIterator, RandomAccessDocIdSet};
use crate::filter::RandomAccessFilter;
use crate::selectivity::freq_sum;
use facets_core::{DocId, FacetConfig, FacetResult, DEFAULT_OR_THRESHOLD};
use facets_index::{FacetSegment, ValueStats, ValueStatsSource};
use roaring::RoaringBitmap;
use std::sync::Arc;
use tracing::debug;

/// Wraps a value filter and unions postings when the selection is rare
pub struct AdaptiveFacetFilter {
    source: Arc<dyn ValueStatsSource>,
    inner: Arc<dyn RandomAccessFilter>,
    values: Vec<String>,
    take_complement: bool,
    or_threshold: usize,
    posting_ratio: f64,
}

impl AdaptiveFacetFilter {
    /// Adaptive wrapper around `inner`, which must select `values` of
    /// `source` (or their complement)
    pub fn new(
        source: Arc<dyn ValueStatsSource>,
        inner: Arc<dyn RandomAccessFilter>,
        values: Vec<String>,
        take_complement: bool,
    ) -> Self {
        Self {
            source,
            inner,
            values,
            take_complement,
            or_threshold: DEFAULT_OR_THRESHOLD,
            posting_ratio: 0.5,
        }
    }

    /// Take the cut-over thresholds from `config`
    pub fn with_config(mut self, config: &FacetConfig) -> Self {
        self.or_threshold = config.or_threshold;
        self.posting_ratio = config.adaptive_posting_ratio;
        self
    }

    /// Union of the postings of every selected value, or `None` if the
    /// search layer cannot supply one of them
    fn posting_union(
        &self,
        segment: &FacetSegment,
        stats: &dyn ValueStats,
        selected: &[(usize, &str)],
    ) -> FacetResult<Option<RoaringBitmap>> {
        let reader = segment.reader();
        let field = self.source.field();
        let mut union = RoaringBitmap::new();
        for &(index, raw) in selected {
            let postings = match reader.postings(field, raw)? {
                Some(postings) => Some(postings),
                None => reader.postings(field, &stats.val_list().get(index))?,
            };
            match postings {
                Some(postings) => union |= postings,
                None => return Ok(None),
            }
        }
        Ok(Some(union))
    }
}

struct PostingDocIdSet {
    postings: RoaringBitmap,
    inner: Box<dyn RandomAccessDocIdSet>,
}

impl DocIdSet for PostingDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        Box::new(BitmapIterator::new(&self.postings))
    }
}

impl RandomAccessDocIdSet for PostingDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        self.inner.get(doc)
    }
}

impl RandomAccessFilter for AdaptiveFacetFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        let inner = self.inner.random_access_doc_id_set(segment)?;
        if self.take_complement {
            return Ok(inner);
        }

        let stats = self.source.value_stats(segment)?;
        let selected: Vec<(usize, &str)> = self
            .values
            .iter()
            .filter_map(|v| stats.val_list().index_of(v).map(|i| (i, v.as_str())))
            .collect();
        let valid_freq = freq_sum(stats.as_ref(), selected.iter().map(|&(i, _)| i));
        let limit = self.posting_ratio * stats.max_doc() as f64;
        if selected.is_empty() || selected.len() >= self.or_threshold || valid_freq as f64 >= limit {
            debug!(
                target: "strata::facets",
                facet = self.source.name(),
                terms = selected.len(),
                valid_freq,
                "Adaptive filter scanning facet values"
            );
            return Ok(inner);
        }

        match self.posting_union(segment, stats.as_ref(), &selected)? {
            Some(postings) => {
                debug!(
                    target: "strata::facets",
                    facet = self.source.name(),
                    terms = selected.len(),
                    valid_freq,
                    "Adaptive filter using posting union"
                );
                Ok(Box::new(PostingDocIdSet { postings, inner }))
            }
            None => Ok(inner),
        }
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        self.inner.selectivity(segment)
    }
}
