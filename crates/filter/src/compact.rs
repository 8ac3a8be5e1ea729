//! Set-membership filter over compact multi-valued facets
//!
//! Each document's values are a bit mask, so a match is a single AND
//! against the mask of the selected values.

use crate::docidset::{in_segment, DocIdSet, DocIdSetIterator, FindIterator, RandomAccessDocIdSet};
use crate::filter::RandomAccessFilter;
use crate::selectivity::{doc_bounds, freq_selectivity};
use facets_core::{DocId, FacetResult, DEFAULT_SELECTIVITY_CLAMP};
use facets_index::{compact_bit, CompactFacetDataCache, FacetDataSource, FacetSegment, ValueStats};
use facets_storage::BigSegmentedArray;
use std::sync::Arc;

/// `field in values` over a compact multi-valued facet
pub struct CompactMultiValueFacetFilter {
    source: Arc<dyn FacetDataSource<CompactFacetDataCache>>,
    values: Vec<String>,
    take_complement: bool,
    clamp: f64,
}

impl CompactMultiValueFacetFilter {
    /// Filter on any of `values`, or none of them when `take_complement`
    pub fn new(
        source: Arc<dyn FacetDataSource<CompactFacetDataCache>>,
        values: Vec<String>,
        take_complement: bool,
    ) -> Self {
        Self {
            source,
            values,
            take_complement,
            clamp: DEFAULT_SELECTIVITY_CLAMP,
        }
    }

    /// Override the selectivity clamp
    pub fn with_selectivity_clamp(mut self, clamp: f64) -> Self {
        self.clamp = clamp;
        self
    }

    fn selected_indices(&self, cache: &CompactFacetDataCache) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .values
            .iter()
            .filter_map(|v| cache.val_list().index_of(v))
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

struct CompactDocIdSet {
    cache: Arc<CompactFacetDataCache>,
    mask: i32,
    take_complement: bool,
    min_id: DocId,
    max_id: DocId,
}

impl CompactDocIdSet {
    fn matches(mask: i32, take_complement: bool, bits: i32) -> bool {
        if take_complement {
            bits != 0 && bits & mask == 0
        } else {
            bits & mask != 0
        }
    }
}

impl DocIdSet for CompactDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        let array = self.cache.bits();
        let (mask, take_complement) = (self.mask, self.take_complement);
        if take_complement {
            Box::new(FindIterator::new(self.min_id, self.max_id, move |from, max| {
                array.find_where(from, max, &|bits| Self::matches(mask, true, bits))
            }))
        } else {
            Box::new(FindIterator::new(self.min_id, self.max_id, move |from, max| {
                array.find_bits(mask, from, max)
            }))
        }
    }
}

impl RandomAccessDocIdSet for CompactDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        in_segment(doc, self.cache.max_doc())
            && Self::matches(self.mask, self.take_complement, self.cache.bits().get(doc))
    }
}

impl RandomAccessFilter for CompactMultiValueFacetFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        let cache = self.source.facet_data(segment)?;
        let selected = self.selected_indices(&cache);
        let mask = selected.iter().fold(0, |mask, &i| mask | compact_bit(i));
        let (min_id, max_id) = if self.take_complement {
            let all = 1..cache.val_list().len();
            doc_bounds(cache.as_ref(), all.filter(|i| selected.binary_search(i).is_err()))
        } else {
            doc_bounds(cache.as_ref(), selected.iter().copied())
        };
        Ok(Box::new(CompactDocIdSet {
            cache,
            mask,
            take_complement: self.take_complement,
            min_id,
            max_id,
        }))
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let cache = self.source.facet_data(segment)?;
        let selected = self.selected_indices(&cache);
        Ok(freq_selectivity(
            cache.as_ref(),
            selected,
            self.take_complement,
            self.clamp,
        ))
    }
}
