//! Filter traits
//!
//! `Filter` is the opaque contract shared with the search layer: it only
//! promises an iterable doc id set. `RandomAccessFilter` is what facet
//! filters implement: a random-access set plus a selectivity estimate the
//! browser uses for planning.

use crate::docidset::{
    AllDocIdSet, DocIdSet, EmptyDocIdSet, RandomAccessAsDocIdSet, RandomAccessDocIdSet,
};
use facets_core::FacetResult;
use facets_index::FacetSegment;
use std::sync::Arc;

/// Selectivity reported by filters that cannot estimate
pub const DEFAULT_SELECTIVITY: f64 = 0.5;

/// Opaque per-segment document filter
pub trait Filter: Send + Sync {
    /// Matching documents of `segment`
    fn doc_id_set(&self, segment: &FacetSegment) -> FacetResult<Box<dyn DocIdSet>>;
}

/// Filter producing random-access doc id sets
pub trait RandomAccessFilter: Send + Sync {
    /// Matching documents of `segment`
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>>;

    /// Estimated fraction of `segment` this filter matches, in `[0, 1]`
    fn selectivity(&self, _segment: &FacetSegment) -> FacetResult<f64> {
        Ok(DEFAULT_SELECTIVITY)
    }
}

/// Random-access filter usable where an opaque `Filter` is expected
pub struct RandomAccessFilterAdapter(pub Arc<dyn RandomAccessFilter>);

impl Filter for RandomAccessFilterAdapter {
    fn doc_id_set(&self, segment: &FacetSegment) -> FacetResult<Box<dyn DocIdSet>> {
        let set = self.0.random_access_doc_id_set(segment)?;
        Ok(Box::new(RandomAccessAsDocIdSet(set)))
    }
}

/// Matches nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFilter;

impl Filter for EmptyFilter {
    fn doc_id_set(&self, _segment: &FacetSegment) -> FacetResult<Box<dyn DocIdSet>> {
        Ok(Box::new(EmptyDocIdSet))
    }
}

impl RandomAccessFilter for EmptyFilter {
    fn random_access_doc_id_set(
        &self,
        _segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        Ok(Box::new(EmptyDocIdSet))
    }

    fn selectivity(&self, _segment: &FacetSegment) -> FacetResult<f64> {
        Ok(0.0)
    }
}

/// Matches every document
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchAllFilter;

impl Filter for MatchAllFilter {
    fn doc_id_set(&self, segment: &FacetSegment) -> FacetResult<Box<dyn DocIdSet>> {
        Ok(Box::new(AllDocIdSet::new(segment.max_doc())))
    }
}

impl RandomAccessFilter for MatchAllFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        Ok(Box::new(AllDocIdSet::new(segment.max_doc())))
    }

    fn selectivity(&self, _segment: &FacetSegment) -> FacetResult<f64> {
        Ok(1.0)
    }
}
