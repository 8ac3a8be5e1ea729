//! Equality filters
//!
//! Match documents holding one given value. The value is resolved to its
//! value-index once per segment; a value the segment does not contain yields
//! the empty set.

use crate::docidset::{
    in_segment, DocIdSet, DocIdSetIterator, EmptyDocIdSet, FindIterator, RandomAccessDocIdSet,
};
use crate::filter::RandomAccessFilter;
use crate::selectivity::freq_selectivity;
use facets_core::{DocId, FacetResult, DEFAULT_SELECTIVITY_CLAMP};
use facets_index::{
    FacetDataCache, FacetDataSource, FacetSegment, MultiValueFacetDataCache, ValueStats,
};
use std::sync::Arc;

/// `field = value` over a single-valued facet
pub struct FacetFilter {
    source: Arc<dyn FacetDataSource<FacetDataCache>>,
    value: String,
    clamp: f64,
}

impl FacetFilter {
    /// Filter on `value`
    pub fn new(source: Arc<dyn FacetDataSource<FacetDataCache>>, value: impl Into<String>) -> Self {
        Self {
            source,
            value: value.into(),
            clamp: DEFAULT_SELECTIVITY_CLAMP,
        }
    }

    /// Override the selectivity clamp
    pub fn with_selectivity_clamp(mut self, clamp: f64) -> Self {
        self.clamp = clamp;
        self
    }

    /// Selected value
    pub fn value(&self) -> &str {
        &self.value
    }
}

struct FacetDocIdSet {
    cache: Arc<FacetDataCache>,
    index: i32,
}

impl DocIdSet for FacetDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        let i = self.index as usize;
        let order = self.cache.order_array();
        let index = self.index;
        Box::new(FindIterator::new(
            self.cache.min_ids()[i],
            self.cache.max_ids()[i],
            move |from, max| order.find_value(index, from, max),
        ))
    }
}

impl RandomAccessDocIdSet for FacetDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        in_segment(doc, self.cache.max_doc()) && self.cache.value_index(doc) == self.index
    }
}

impl RandomAccessFilter for FacetFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        let cache = self.source.facet_data(segment)?;
        Ok(match cache.val_list().index_of(&self.value) {
            Some(index) => Box::new(FacetDocIdSet {
                cache,
                index: index as i32,
            }),
            None => Box::new(EmptyDocIdSet),
        })
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let cache = self.source.facet_data(segment)?;
        let indices = cache.val_list().index_of(&self.value);
        Ok(freq_selectivity(cache.as_ref(), indices, false, self.clamp))
    }
}

/// `field = value` over a multi-valued facet
pub struct MultiValueFacetFilter {
    source: Arc<dyn FacetDataSource<MultiValueFacetDataCache>>,
    value: String,
    clamp: f64,
}

impl MultiValueFacetFilter {
    /// Filter on `value`
    pub fn new(
        source: Arc<dyn FacetDataSource<MultiValueFacetDataCache>>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            source,
            value: value.into(),
            clamp: DEFAULT_SELECTIVITY_CLAMP,
        }
    }

    /// Override the selectivity clamp
    pub fn with_selectivity_clamp(mut self, clamp: f64) -> Self {
        self.clamp = clamp;
        self
    }
}

struct MultiValueFacetDocIdSet {
    cache: Arc<MultiValueFacetDataCache>,
    index: i32,
}

impl DocIdSet for MultiValueFacetDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        let i = self.index as usize;
        let nested = self.cache.nested_array();
        let index = self.index;
        Box::new(FindIterator::new(
            self.cache.min_ids()[i],
            self.cache.max_ids()[i],
            move |from, max| nested.find_value(index, from, max),
        ))
    }
}

impl RandomAccessDocIdSet for MultiValueFacetDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        in_segment(doc, self.cache.max_doc()) && self.cache.nested_array().contains(doc, self.index)
    }
}

impl RandomAccessFilter for MultiValueFacetFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        let cache = self.source.facet_data(segment)?;
        Ok(match cache.val_list().index_of(&self.value) {
            Some(index) => Box::new(MultiValueFacetDocIdSet {
                cache,
                index: index as i32,
            }),
            None => Box::new(EmptyDocIdSet),
        })
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let cache = self.source.facet_data(segment)?;
        let indices = cache.val_list().index_of(&self.value);
        Ok(freq_selectivity(cache.as_ref(), indices, false, self.clamp))
    }
}
