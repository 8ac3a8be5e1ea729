//! Boolean composition of filters
//!
//! The random-access combinators keep `get` available on the result, so an
//! AND drives iteration from its most selective child and verifies the rest
//! with `get`. The opaque combinators only have iterators and use leapfrog
//! intersection and k-way union instead.
//!
//! `combine` on each combinator returns a single child unwrapped.

use crate::docidset::{
    in_segment, AllDocIdSet, DocIdSet, DocIdSetIterator, EmptyIterator, RandomAccessDocIdSet,
};
use crate::filter::{EmptyFilter, Filter, MatchAllFilter, RandomAccessFilter};
use facets_core::{clamp_selectivity, DocId, FacetResult, DEFAULT_SELECTIVITY_CLAMP, NO_MORE_DOCS};
use facets_index::FacetSegment;
use std::sync::Arc;

// ============================================================================
// Iterators
// ============================================================================

/// Lead iterator whose docs are verified against random-access sets
struct ConjunctionIterator<'a> {
    lead: Box<dyn DocIdSetIterator + 'a>,
    others: &'a [Box<dyn RandomAccessDocIdSet>],
}

impl ConjunctionIterator<'_> {
    fn settle(&mut self, mut doc: DocId) -> DocId {
        while doc != NO_MORE_DOCS && !self.others.iter().all(|set| set.get(doc)) {
            doc = self.lead.next_doc();
        }
        doc
    }
}

impl DocIdSetIterator for ConjunctionIterator<'_> {
    fn doc_id(&self) -> DocId {
        self.lead.doc_id()
    }

    fn next_doc(&mut self) -> DocId {
        let doc = self.lead.next_doc();
        self.settle(doc)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if target <= self.lead.doc_id() {
            return self.lead.doc_id();
        }
        let doc = self.lead.advance(target);
        self.settle(doc)
    }
}

/// Leapfrog intersection of plain iterators
struct IntersectionIterator<'a> {
    iters: Vec<Box<dyn DocIdSetIterator + 'a>>,
    doc: DocId,
}

impl IntersectionIterator<'_> {
    /// Align every iterator on the first common doc at or after `target`
    fn align(&mut self, mut target: DocId) -> DocId {
        'outer: loop {
            if target == NO_MORE_DOCS {
                break;
            }
            for iter in self.iters.iter_mut() {
                let mut doc = iter.doc_id();
                if doc < target {
                    doc = iter.advance(target);
                }
                if doc > target {
                    target = doc;
                    continue 'outer;
                }
            }
            break;
        }
        self.doc = target;
        target
    }
}

impl DocIdSetIterator for IntersectionIterator<'_> {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        if self.doc == NO_MORE_DOCS {
            return NO_MORE_DOCS;
        }
        self.align(self.doc + 1)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if target <= self.doc || self.doc == NO_MORE_DOCS {
            return self.doc;
        }
        self.align(target)
    }
}

/// K-way union of plain iterators
struct UnionIterator<'a> {
    iters: Vec<Box<dyn DocIdSetIterator + 'a>>,
    doc: DocId,
}

impl UnionIterator<'_> {
    fn seek(&mut self, target: DocId) -> DocId {
        let mut min = NO_MORE_DOCS;
        for iter in self.iters.iter_mut() {
            let mut doc = iter.doc_id();
            if doc < target {
                doc = iter.advance(target);
            }
            min = min.min(doc);
        }
        self.doc = min;
        min
    }
}

impl DocIdSetIterator for UnionIterator<'_> {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        if self.doc == NO_MORE_DOCS {
            return NO_MORE_DOCS;
        }
        self.seek(self.doc + 1)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if target <= self.doc || self.doc == NO_MORE_DOCS {
            return self.doc;
        }
        self.seek(target)
    }
}

/// Docs in `0..max_doc` not produced by `excluded`
struct ExclusionIterator<'a> {
    excluded: Box<dyn DocIdSetIterator + 'a>,
    max_doc: DocId,
    doc: DocId,
}

impl ExclusionIterator<'_> {
    fn seek(&mut self, mut candidate: DocId) -> DocId {
        loop {
            if candidate >= self.max_doc {
                self.doc = NO_MORE_DOCS;
                return NO_MORE_DOCS;
            }
            let mut skip = self.excluded.doc_id();
            if skip < candidate {
                skip = self.excluded.advance(candidate);
            }
            if skip != candidate {
                self.doc = candidate;
                return candidate;
            }
            candidate += 1;
        }
    }
}

impl DocIdSetIterator for ExclusionIterator<'_> {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        if self.doc == NO_MORE_DOCS {
            return NO_MORE_DOCS;
        }
        self.seek(self.doc + 1)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if target <= self.doc || self.doc == NO_MORE_DOCS {
            return self.doc;
        }
        self.seek(target)
    }
}

fn segment_size(max_doc: usize) -> DocId {
    max_doc.min(NO_MORE_DOCS as usize) as DocId
}

// ============================================================================
// Random-access combinators
// ============================================================================

/// Intersection of random-access filters
pub struct RandomAccessAndFilter {
    filters: Vec<Arc<dyn RandomAccessFilter>>,
}

impl RandomAccessAndFilter {
    /// AND of `filters`
    pub fn new(filters: Vec<Arc<dyn RandomAccessFilter>>) -> Self {
        Self { filters }
    }

    /// AND of `filters`, unwrapping a single child; no children match all
    pub fn combine(mut filters: Vec<Arc<dyn RandomAccessFilter>>) -> Arc<dyn RandomAccessFilter> {
        match filters.len() {
            0 => Arc::new(MatchAllFilter),
            1 => filters.remove(0),
            _ => Arc::new(Self::new(filters)),
        }
    }
}

struct AndDocIdSet {
    sets: Vec<Box<dyn RandomAccessDocIdSet>>,
}

impl DocIdSet for AndDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        match self.sets.split_first() {
            Some((lead, others)) => Box::new(ConjunctionIterator {
                lead: lead.iterator(),
                others,
            }),
            None => Box::new(EmptyIterator::new()),
        }
    }
}

impl RandomAccessDocIdSet for AndDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        self.sets.iter().all(|set| set.get(doc))
    }
}

impl RandomAccessFilter for RandomAccessAndFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        if self.filters.is_empty() {
            return Ok(Box::new(AllDocIdSet::new(segment.max_doc())));
        }
        // Most selective child leads the iteration
        let mut ranked = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            ranked.push((filter.selectivity(segment)?, filter));
        }
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut sets = Vec::with_capacity(ranked.len());
        for (_, filter) in ranked {
            sets.push(filter.random_access_doc_id_set(segment)?);
        }
        Ok(Box::new(AndDocIdSet { sets }))
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let mut min: f64 = 1.0;
        for filter in &self.filters {
            min = min.min(filter.selectivity(segment)?);
        }
        Ok(min)
    }
}

/// Union of random-access filters
pub struct RandomAccessOrFilter {
    filters: Vec<Arc<dyn RandomAccessFilter>>,
    clamp: f64,
}

impl RandomAccessOrFilter {
    /// OR of `filters`
    pub fn new(filters: Vec<Arc<dyn RandomAccessFilter>>) -> Self {
        Self {
            filters,
            clamp: DEFAULT_SELECTIVITY_CLAMP,
        }
    }

    /// Override the selectivity clamp
    pub fn with_selectivity_clamp(mut self, clamp: f64) -> Self {
        self.clamp = clamp;
        self
    }

    /// OR of `filters`, unwrapping a single child; no children match nothing
    pub fn combine(mut filters: Vec<Arc<dyn RandomAccessFilter>>) -> Arc<dyn RandomAccessFilter> {
        match filters.len() {
            0 => Arc::new(EmptyFilter),
            1 => filters.remove(0),
            _ => Arc::new(Self::new(filters)),
        }
    }
}

struct OrDocIdSet {
    sets: Vec<Box<dyn RandomAccessDocIdSet>>,
}

impl DocIdSet for OrDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        Box::new(UnionIterator {
            iters: self.sets.iter().map(|set| set.iterator()).collect(),
            doc: -1,
        })
    }
}

impl RandomAccessDocIdSet for OrDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        self.sets.iter().any(|set| set.get(doc))
    }
}

impl RandomAccessFilter for RandomAccessOrFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        let sets = self
            .filters
            .iter()
            .map(|filter| filter.random_access_doc_id_set(segment))
            .collect::<FacetResult<Vec<_>>>()?;
        Ok(Box::new(OrDocIdSet { sets }))
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let mut sum = 0.0;
        for filter in &self.filters {
            sum += filter.selectivity(segment)?;
        }
        Ok(clamp_selectivity(sum, self.clamp))
    }
}

/// Complement of a random-access filter within the segment
pub struct RandomAccessNotFilter {
    inner: Arc<dyn RandomAccessFilter>,
    clamp: f64,
}

impl RandomAccessNotFilter {
    /// NOT `inner`
    pub fn new(inner: Arc<dyn RandomAccessFilter>) -> Self {
        Self {
            inner,
            clamp: DEFAULT_SELECTIVITY_CLAMP,
        }
    }

    /// Override the selectivity clamp
    pub fn with_selectivity_clamp(mut self, clamp: f64) -> Self {
        self.clamp = clamp;
        self
    }
}

struct NotDocIdSet {
    inner: Box<dyn RandomAccessDocIdSet>,
    max_doc: usize,
}

impl DocIdSet for NotDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        Box::new(ExclusionIterator {
            excluded: self.inner.iterator(),
            max_doc: segment_size(self.max_doc),
            doc: -1,
        })
    }
}

impl RandomAccessDocIdSet for NotDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        in_segment(doc, self.max_doc) && !self.inner.get(doc)
    }
}

impl RandomAccessFilter for RandomAccessNotFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        Ok(Box::new(NotDocIdSet {
            inner: self.inner.random_access_doc_id_set(segment)?,
            max_doc: segment.max_doc(),
        }))
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let inner = self.inner.selectivity(segment)?;
        let selectivity = if inner > self.clamp { 0.0 } else { 1.0 - inner };
        Ok(clamp_selectivity(selectivity, self.clamp))
    }
}

// ============================================================================
// Opaque combinators
// ============================================================================

/// Intersection of opaque filters
pub struct AndFilter {
    filters: Vec<Arc<dyn Filter>>,
}

impl AndFilter {
    /// AND of `filters`
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self { filters }
    }

    /// AND of `filters`, unwrapping a single child; no children match all
    pub fn combine(mut filters: Vec<Arc<dyn Filter>>) -> Arc<dyn Filter> {
        match filters.len() {
            0 => Arc::new(MatchAllFilter),
            1 => filters.remove(0),
            _ => Arc::new(Self::new(filters)),
        }
    }
}

struct OpaqueAndDocIdSet {
    sets: Vec<Box<dyn DocIdSet>>,
}

impl DocIdSet for OpaqueAndDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        Box::new(IntersectionIterator {
            iters: self.sets.iter().map(|set| set.iterator()).collect(),
            doc: -1,
        })
    }
}

impl Filter for AndFilter {
    fn doc_id_set(&self, segment: &FacetSegment) -> FacetResult<Box<dyn DocIdSet>> {
        if self.filters.is_empty() {
            return Ok(Box::new(AllDocIdSet::new(segment.max_doc())));
        }
        let sets = self
            .filters
            .iter()
            .map(|filter| filter.doc_id_set(segment))
            .collect::<FacetResult<Vec<_>>>()?;
        Ok(Box::new(OpaqueAndDocIdSet { sets }))
    }
}

/// Union of opaque filters
pub struct OrFilter {
    filters: Vec<Arc<dyn Filter>>,
}

impl OrFilter {
    /// OR of `filters`
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self { filters }
    }

    /// OR of `filters`, unwrapping a single child; no children match nothing
    pub fn combine(mut filters: Vec<Arc<dyn Filter>>) -> Arc<dyn Filter> {
        match filters.len() {
            0 => Arc::new(EmptyFilter),
            1 => filters.remove(0),
            _ => Arc::new(Self::new(filters)),
        }
    }
}

struct OpaqueOrDocIdSet {
    sets: Vec<Box<dyn DocIdSet>>,
}

impl DocIdSet for OpaqueOrDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        Box::new(UnionIterator {
            iters: self.sets.iter().map(|set| set.iterator()).collect(),
            doc: -1,
        })
    }
}

impl Filter for OrFilter {
    fn doc_id_set(&self, segment: &FacetSegment) -> FacetResult<Box<dyn DocIdSet>> {
        let sets = self
            .filters
            .iter()
            .map(|filter| filter.doc_id_set(segment))
            .collect::<FacetResult<Vec<_>>>()?;
        Ok(Box::new(OpaqueOrDocIdSet { sets }))
    }
}

/// Complement of an opaque filter within the segment
pub struct NotFilter {
    inner: Arc<dyn Filter>,
}

impl NotFilter {
    /// NOT `inner`
    pub fn new(inner: Arc<dyn Filter>) -> Self {
        Self { inner }
    }
}

struct OpaqueNotDocIdSet {
    inner: Box<dyn DocIdSet>,
    max_doc: usize,
}

impl DocIdSet for OpaqueNotDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        Box::new(ExclusionIterator {
            excluded: self.inner.iterator(),
            max_doc: segment_size(self.max_doc),
            doc: -1,
        })
    }
}

impl Filter for NotFilter {
    fn doc_id_set(&self, segment: &FacetSegment) -> FacetResult<Box<dyn DocIdSet>> {
        Ok(Box::new(OpaqueNotDocIdSet {
            inner: self.inner.doc_id_set(segment)?,
            max_doc: segment.max_doc(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docidset::collect_docs;
    use crate::facet::FacetFilter;
    use crate::filter::RandomAccessFilterAdapter;
    use crate::or::FacetOrFilter;
    use crate::range::FacetRangeFilter;
    use crate::testing::{assert_consistent, colors, segment_with, strings};
    use facets_core::ValueKind;
    use facets_index::{FacetDataCache, FacetDataSource, SingleValueSource};
    use proptest::prelude::*;

    /// 8 docs: color red/blue alternating, size 1..=8
    fn segment() -> FacetSegment {
        segment_with(8, |seg| {
            for doc in 0..8 {
                let color = if doc % 2 == 0 { "red" } else { "blue" };
                seg.add(doc, "color", color);
                seg.add(doc, "size", &(doc + 1).to_string());
            }
        })
    }

    fn color(value: &str) -> Arc<dyn RandomAccessFilter> {
        let source: Arc<dyn FacetDataSource<FacetDataCache>> =
            Arc::new(SingleValueSource::new("color", "color", ValueKind::String));
        Arc::new(FacetFilter::new(source, value))
    }

    fn size(range: &str) -> Arc<dyn RandomAccessFilter> {
        let source: Arc<dyn FacetDataSource<FacetDataCache>> =
            Arc::new(SingleValueSource::new("size", "size", ValueKind::Int));
        Arc::new(FacetRangeFilter::new(source, range))
    }

    fn docs(filter: &dyn RandomAccessFilter, segment: &FacetSegment) -> Vec<DocId> {
        let set = filter.random_access_doc_id_set(segment).unwrap();
        assert_consistent(set.as_ref(), segment.max_doc());
        collect_docs(set.iterator())
    }

    fn opaque_docs(filter: &dyn Filter, segment: &FacetSegment) -> Vec<DocId> {
        collect_docs(filter.doc_id_set(segment).unwrap().iterator())
    }

    #[test]
    fn test_and() {
        let segment = segment();
        let and = RandomAccessAndFilter::new(vec![color("red"), size("[3 TO 6]")]);
        assert_eq!(docs(&and, &segment), vec![2, 4]);
        let s = and.selectivity(&segment).unwrap();
        assert!((s - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_or() {
        let segment = segment();
        let or = RandomAccessOrFilter::new(vec![color("blue"), size("[* TO 2]")]);
        assert_eq!(docs(&or, &segment), vec![0, 1, 3, 5, 7]);
        // 0.5 + 0.25
        assert!((or.selectivity(&segment).unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_not() {
        let segment = segment();
        let not = RandomAccessNotFilter::new(size("[2 TO 7]"));
        assert_eq!(docs(&not, &segment), vec![0, 7]);
        assert!((not.selectivity(&segment).unwrap() - 0.25).abs() < 1e-9);

        let nothing = RandomAccessNotFilter::new(Arc::new(MatchAllFilter));
        assert!(docs(&nothing, &segment).is_empty());
        assert_eq!(nothing.selectivity(&segment).unwrap(), 0.0);
    }

    #[test]
    fn test_combine_unwraps_single_child() {
        let only = color("red");
        let combined = RandomAccessAndFilter::combine(vec![only.clone()]);
        assert!(Arc::ptr_eq(&only, &combined));
        let combined = RandomAccessOrFilter::combine(vec![only.clone()]);
        assert!(Arc::ptr_eq(&only, &combined));

        let segment = segment();
        let all = RandomAccessAndFilter::combine(Vec::new());
        assert_eq!(docs(all.as_ref(), &segment).len(), 8);
        let none = RandomAccessOrFilter::combine(Vec::new());
        assert!(docs(none.as_ref(), &segment).is_empty());
    }

    #[test]
    fn test_opaque_combinators() {
        let segment = segment();
        let red: Arc<dyn Filter> = Arc::new(RandomAccessFilterAdapter(color("red")));
        let small: Arc<dyn Filter> = Arc::new(RandomAccessFilterAdapter(size("[* TO 4]")));

        let and = AndFilter::new(vec![red.clone(), small.clone()]);
        assert_eq!(opaque_docs(&and, &segment), vec![0, 2]);

        let or = OrFilter::new(vec![red.clone(), small.clone()]);
        assert_eq!(opaque_docs(&or, &segment), vec![0, 1, 2, 3, 4, 6]);

        let not = NotFilter::new(red);
        assert_eq!(opaque_docs(&not, &segment), vec![1, 3, 5, 7]);

        assert!(Arc::ptr_eq(&small, &AndFilter::combine(vec![small.clone()])));
        assert!(opaque_docs(OrFilter::combine(Vec::new()).as_ref(), &segment).is_empty());
    }

    #[test]
    fn test_opaque_advance() {
        let segment = colors();
        let source: Arc<dyn FacetDataSource<FacetDataCache>> =
            Arc::new(SingleValueSource::new("color", "color", ValueKind::String));
        let red: Arc<dyn Filter> = Arc::new(RandomAccessFilterAdapter(Arc::new(
            FacetFilter::new(source.clone(), "red"),
        )));
        let warm: Arc<dyn Filter> = Arc::new(RandomAccessFilterAdapter(Arc::new(
            FacetOrFilter::new(source, strings(&["red", "green"]), false),
        )));
        let and = AndFilter::new(vec![red, warm]);
        let set = and.doc_id_set(&segment).unwrap();
        let mut iter = set.iterator();
        assert_eq!(iter.advance(2), 6);
        assert_eq!(iter.advance(3), 6);
        assert_eq!(iter.next_doc(), NO_MORE_DOCS);
    }

    fn arb_filter() -> impl Strategy<Value = (bool, i32, i32)> {
        (any::<bool>(), 1i32..9, 1i32..9)
    }

    fn build((by_color, lo, hi): (bool, i32, i32)) -> Arc<dyn RandomAccessFilter> {
        if by_color {
            color(if lo % 2 == 0 { "red" } else { "blue" })
        } else {
            size(&format!("[{} TO {}]", lo.min(hi), lo.max(hi)))
        }
    }

    proptest! {
        #[test]
        fn prop_selectivity_bounds(specs in prop::collection::vec(arb_filter(), 1..4)) {
            let segment = segment();
            let children: Vec<_> = specs.into_iter().map(build).collect();
            let mut child_sel = Vec::new();
            for child in &children {
                child_sel.push(child.selectivity(&segment).unwrap());
            }
            let min = child_sel.iter().cloned().fold(1.0, f64::min);
            let max = child_sel.iter().cloned().fold(0.0, f64::max);

            let and = RandomAccessAndFilter::new(children.clone());
            let or = RandomAccessOrFilter::new(children.clone());
            let and_sel = and.selectivity(&segment).unwrap();
            let or_sel = or.selectivity(&segment).unwrap();
            prop_assert!((0.0..=1.0).contains(&and_sel));
            prop_assert!((0.0..=1.0).contains(&or_sel));
            prop_assert!(and_sel <= min + 1e-12);
            prop_assert!(or_sel + 1e-12 >= max);

            let and_docs = docs(&and, &segment);
            let or_docs = docs(&or, &segment);
            for doc in 0..8 {
                let hits = children
                    .iter()
                    .filter(|c| c.random_access_doc_id_set(&segment).unwrap().get(doc))
                    .count();
                prop_assert_eq!(and_docs.contains(&doc), hits == children.len());
                prop_assert_eq!(or_docs.contains(&doc), hits > 0);
            }
        }
    }
}
