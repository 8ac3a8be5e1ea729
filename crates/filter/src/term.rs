//! Postings filter
//!
//! Matches the documents the search layer lists for one term, without
//! touching any facet data.

use crate::docidset::{BitmapDocIdSet, DocIdSet, EmptyDocIdSet, RandomAccessDocIdSet};
use crate::filter::{Filter, RandomAccessFilter};
use facets_core::FacetResult;
use facets_index::FacetSegment;

/// `field:term` straight from the postings of the segment
#[derive(Debug, Clone)]
pub struct TermFilter {
    field: String,
    term: String,
}

impl TermFilter {
    /// Filter on `term` of `field`
    pub fn new(field: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            term: term.into(),
        }
    }

    fn bitmap_set(&self, segment: &FacetSegment) -> FacetResult<Option<BitmapDocIdSet>> {
        Ok(segment
            .reader()
            .postings(&self.field, &self.term)?
            .map(BitmapDocIdSet::new))
    }
}

impl Filter for TermFilter {
    fn doc_id_set(&self, segment: &FacetSegment) -> FacetResult<Box<dyn DocIdSet>> {
        Ok(match self.bitmap_set(segment)? {
            Some(set) => Box::new(set),
            None => Box::new(EmptyDocIdSet),
        })
    }
}

impl RandomAccessFilter for TermFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        Ok(match self.bitmap_set(segment)? {
            Some(set) => Box::new(set),
            None => Box::new(EmptyDocIdSet),
        })
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let max_doc = segment.max_doc();
        if max_doc == 0 {
            return Ok(0.0);
        }
        let len = self.bitmap_set(segment)?.map_or(0, |set| set.len());
        Ok((len as f64 / max_doc as f64).min(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docidset::collect_docs;
    use crate::testing::{assert_consistent, colors};

    #[test]
    fn test_term_postings() {
        let segment = colors();
        let filter = TermFilter::new("color", "green");
        let set = filter.random_access_doc_id_set(&segment).unwrap();
        assert_eq!(collect_docs(set.iterator()), vec![2, 5]);
        assert_consistent(set.as_ref(), segment.max_doc());
        let s = filter.selectivity(&segment).unwrap();
        assert!((s - 2.0 / 7.0).abs() < 1e-9);

        let opaque = filter.doc_id_set(&segment).unwrap();
        assert_eq!(collect_docs(opaque.iterator()), vec![2, 5]);
    }

    #[test]
    fn test_missing_term() {
        let segment = colors();
        let filter = TermFilter::new("color", "purple");
        let set = filter.random_access_doc_id_set(&segment).unwrap();
        assert!(collect_docs(set.iterator()).is_empty());
        assert_eq!(filter.selectivity(&segment).unwrap(), 0.0);
        assert!(collect_docs(
            TermFilter::new("shape", "red").doc_id_set(&segment).unwrap().iterator()
        )
        .is_empty());
    }
}
