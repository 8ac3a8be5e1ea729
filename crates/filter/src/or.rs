//! Set-membership filters
//!
//! Match documents holding any of several values, or with `take_complement`
//! set, documents holding none of them. The selected values are resolved to
//! a bitset over value-indices, cached per facet data build.
//!
//! A complement never matches documents without a value: missing is not
//! treated as "some other value". For multi-valued fields a complement match
//! means the document has at least one value and none of them is selected.

use crate::bitset_cache::BitSetCache;
use crate::docidset::{
    in_segment, DocIdSet, DocIdSetIterator, FindIterator, RandomAccessDocIdSet,
};
use crate::filter::RandomAccessFilter;
use crate::selectivity::{doc_bounds, freq_selectivity};
use facets_core::{DocId, FacetResult, DEFAULT_SELECTIVITY_CLAMP};
use facets_index::{
    FacetDataCache, FacetDataSource, FacetSegment, MultiValueFacetDataCache, ValueStats,
};
use facets_storage::{OpenBitSet, TermValueList};
use std::sync::Arc;

/// Bitset of the value-indices of `values` found in `list`
pub fn value_bitset(list: &dyn TermValueList, values: &[String]) -> OpenBitSet {
    let mut bits = OpenBitSet::with_capacity(list.len());
    for index in values.iter().filter_map(|v| list.index_of(v)) {
        bits.set(index);
    }
    bits
}

/// Every real value-index not set in `bits`
fn complement_indices(bits: &OpenBitSet) -> impl Iterator<Item = usize> + '_ {
    (1..bits.capacity()).filter(move |&i| !bits.get(i))
}

// ============================================================================
// FacetOrFilter
// ============================================================================

/// `field in values` over a single-valued facet
pub struct FacetOrFilter {
    source: Arc<dyn FacetDataSource<FacetDataCache>>,
    values: Vec<String>,
    take_complement: bool,
    clamp: f64,
    bitsets: BitSetCache,
}

impl FacetOrFilter {
    /// Filter on any of `values`, or none of them when `take_complement`
    pub fn new(
        source: Arc<dyn FacetDataSource<FacetDataCache>>,
        values: Vec<String>,
        take_complement: bool,
    ) -> Self {
        Self {
            source,
            values,
            take_complement,
            clamp: DEFAULT_SELECTIVITY_CLAMP,
            bitsets: BitSetCache::new(),
        }
    }

    /// Override the selectivity clamp
    pub fn with_selectivity_clamp(mut self, clamp: f64) -> Self {
        self.clamp = clamp;
        self
    }

    /// Bitset of matching value-indices for `cache`
    fn match_bits(&self, cache: &FacetDataCache) -> Arc<OpenBitSet> {
        self.bitsets.get_or_build(cache.cache_id(), || {
            let mut bits = value_bitset(cache.val_list(), &self.values);
            if self.take_complement {
                bits.flip_range(1, bits.capacity());
            }
            bits
        })
    }
}

struct FacetOrDocIdSet {
    cache: Arc<FacetDataCache>,
    bits: Arc<OpenBitSet>,
    min_id: DocId,
    max_id: DocId,
}

impl DocIdSet for FacetOrDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        let order = self.cache.order_array();
        let bits = self.bits.as_ref();
        Box::new(FindIterator::new(self.min_id, self.max_id, move |from, max| {
            order.find_values(bits, from, max)
        }))
    }
}

impl RandomAccessDocIdSet for FacetOrDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        in_segment(doc, self.cache.max_doc()) && self.bits.get_i32(self.cache.value_index(doc))
    }
}

impl RandomAccessFilter for FacetOrFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        let cache = self.source.facet_data(segment)?;
        let bits = self.match_bits(&cache);
        let (min_id, max_id) = doc_bounds(cache.as_ref(), bits.iter_ones());
        Ok(Box::new(FacetOrDocIdSet {
            cache,
            bits,
            min_id,
            max_id,
        }))
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let cache = self.source.facet_data(segment)?;
        let selected = value_bitset(cache.val_list(), &self.values);
        Ok(freq_selectivity(
            cache.as_ref(),
            selected.iter_ones(),
            self.take_complement,
            self.clamp,
        ))
    }
}

// ============================================================================
// MultiValueOrFacetFilter
// ============================================================================

/// `field in values` over a multi-valued facet
pub struct MultiValueOrFacetFilter {
    source: Arc<dyn FacetDataSource<MultiValueFacetDataCache>>,
    values: Vec<String>,
    take_complement: bool,
    clamp: f64,
    bitsets: BitSetCache,
}

impl MultiValueOrFacetFilter {
    /// Filter on any of `values`, or none of them when `take_complement`
    pub fn new(
        source: Arc<dyn FacetDataSource<MultiValueFacetDataCache>>,
        values: Vec<String>,
        take_complement: bool,
    ) -> Self {
        Self {
            source,
            values,
            take_complement,
            clamp: DEFAULT_SELECTIVITY_CLAMP,
            bitsets: BitSetCache::new(),
        }
    }

    /// Override the selectivity clamp
    pub fn with_selectivity_clamp(mut self, clamp: f64) -> Self {
        self.clamp = clamp;
        self
    }
}

struct MultiValueOrDocIdSet {
    cache: Arc<MultiValueFacetDataCache>,
    selected: Arc<OpenBitSet>,
    take_complement: bool,
    min_id: DocId,
    max_id: DocId,
}

impl DocIdSet for MultiValueOrDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        let nested = self.cache.nested_array();
        let bits = self.selected.as_ref();
        if self.take_complement {
            Box::new(FindIterator::new(self.min_id, self.max_id, move |from, max| {
                nested.find_values_outside(bits, from, max)
            }))
        } else {
            Box::new(FindIterator::new(self.min_id, self.max_id, move |from, max| {
                nested.find_values(bits, from, max)
            }))
        }
    }
}

impl RandomAccessDocIdSet for MultiValueOrDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        if !in_segment(doc, self.cache.max_doc()) {
            return false;
        }
        let nested = self.cache.nested_array();
        if self.take_complement {
            nested.contains_only_outside(doc, &self.selected)
        } else {
            nested.contains_any(doc, &self.selected)
        }
    }
}

impl RandomAccessFilter for MultiValueOrFacetFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        let cache = self.source.facet_data(segment)?;
        let selected = self
            .bitsets
            .get_or_build(cache.cache_id(), || value_bitset(cache.val_list(), &self.values));
        let (min_id, max_id) = if self.take_complement {
            doc_bounds(cache.as_ref(), complement_indices(&selected))
        } else {
            doc_bounds(cache.as_ref(), selected.iter_ones())
        };
        Ok(Box::new(MultiValueOrDocIdSet {
            cache,
            selected,
            take_complement: self.take_complement,
            min_id,
            max_id,
        }))
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let cache = self.source.facet_data(segment)?;
        let selected = value_bitset(cache.val_list(), &self.values);
        Ok(freq_selectivity(
            cache.as_ref(),
            selected.iter_ones(),
            self.take_complement,
            self.clamp,
        ))
    }
}
