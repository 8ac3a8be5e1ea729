//! Range filters
//!
//! A range string selects a contiguous run of value-indices:
//!
//! ```text
//! "[" | "(" lower " TO " upper "]" | ")"
//! ```
//!
//! Square brackets are inclusive, parentheses exclusive, and `*` leaves a
//! side unbounded. Tokens are trimmed; the ` TO ` separator is matched
//! case-sensitively. Bounds do not have to be present in the segment: they
//! are resolved to insertion points in the sorted value list.

use crate::docidset::{
    in_segment, DocIdSet, DocIdSetIterator, EmptyDocIdSet, FindIterator, RandomAccessDocIdSet,
};
use crate::filter::RandomAccessFilter;
use crate::selectivity::{doc_bounds, freq_selectivity};
use facets_core::{DocId, FacetError, FacetResult, DEFAULT_SELECTIVITY_CLAMP};
use facets_index::{
    FacetDataCache, FacetDataSource, FacetSegment, MultiValueFacetDataCache, ValueStats,
};
use facets_storage::TermValueList;
use std::sync::Arc;

/// Parsed range string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    /// Lower bound, `None` when unbounded
    pub lower: Option<String>,
    /// Upper bound, `None` when unbounded
    pub upper: Option<String>,
    /// Whether `lower` itself is included
    pub include_lower: bool,
    /// Whether `upper` itself is included
    pub include_upper: bool,
}

impl RangeSpec {
    /// Parse `[A TO B]`, `(A TO B)` and mixed-bracket forms
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` for a missing bracket, separator or bound.
    pub fn parse(range: &str) -> FacetResult<Self> {
        let trimmed = range.trim();
        let include_lower = match trimmed.chars().next() {
            Some('[') => true,
            Some('(') => false,
            _ => return Err(FacetError::invalid_range(range, "must start with '[' or '('")),
        };
        let include_upper = match trimmed.chars().last() {
            Some(']') if trimmed.len() > 1 => true,
            Some(')') if trimmed.len() > 1 => false,
            _ => return Err(FacetError::invalid_range(range, "must end with ']' or ')'")),
        };
        let inner = &trimmed[1..trimmed.len() - 1];
        let (lower, upper) = inner
            .split_once(" TO ")
            .ok_or_else(|| FacetError::invalid_range(range, "missing ' TO ' separator"))?;
        Ok(Self {
            lower: parse_bound(range, lower)?,
            upper: parse_bound(range, upper)?,
            include_lower,
            include_upper,
        })
    }

    /// Inclusive value-index range `[start, end]` of this range in `list`
    ///
    /// Returns `None` when no value-index falls in the range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if a bound does not parse as the list's type.
    pub fn resolve(&self, list: &dyn TermValueList) -> FacetResult<Option<(usize, usize)>> {
        let start = match &self.lower {
            None => 1,
            Some(value) => match list.search(value)? {
                Ok(index) if self.include_lower => index,
                Ok(index) => index + 1,
                Err(insertion) => insertion,
            },
        };
        let end = match &self.upper {
            None => list.len() - 1,
            Some(value) => match list.search(value)? {
                Ok(index) if self.include_upper => index,
                Ok(index) => index - 1,
                Err(insertion) => insertion.saturating_sub(1),
            },
        };
        Ok((start <= end && end >= 1).then_some((start, end)))
    }
}

fn parse_bound(range: &str, token: &str) -> FacetResult<Option<String>> {
    match token.trim() {
        "" => Err(FacetError::invalid_range(range, "empty bound")),
        "*" => Ok(None),
        bound => Ok(Some(bound.to_string())),
    }
}

/// Value-index range of `range` in `list`, `None` when empty
pub fn parse_range(list: &dyn TermValueList, range: &str) -> FacetResult<Option<(usize, usize)>> {
    RangeSpec::parse(range)?.resolve(list)
}

// ============================================================================
// FacetRangeFilter
// ============================================================================

/// Range over a single-valued facet
pub struct FacetRangeFilter {
    source: Arc<dyn FacetDataSource<FacetDataCache>>,
    range: String,
    clamp: f64,
}

impl FacetRangeFilter {
    /// Filter on `range`
    pub fn new(source: Arc<dyn FacetDataSource<FacetDataCache>>, range: impl Into<String>) -> Self {
        Self {
            source,
            range: range.into(),
            clamp: DEFAULT_SELECTIVITY_CLAMP,
        }
    }

    /// Override the selectivity clamp
    pub fn with_selectivity_clamp(mut self, clamp: f64) -> Self {
        self.clamp = clamp;
        self
    }
}

struct FacetRangeDocIdSet {
    cache: Arc<FacetDataCache>,
    start: i32,
    end: i32,
    min_id: DocId,
    max_id: DocId,
}

impl DocIdSet for FacetRangeDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        let order = self.cache.order_array();
        let (start, end) = (self.start, self.end);
        Box::new(FindIterator::new(self.min_id, self.max_id, move |from, max| {
            order.find_value_range(start, end, from, max)
        }))
    }
}

impl RandomAccessDocIdSet for FacetRangeDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        if !in_segment(doc, self.cache.max_doc()) {
            return false;
        }
        let index = self.cache.value_index(doc);
        index >= self.start && index <= self.end
    }
}

impl RandomAccessFilter for FacetRangeFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        let cache = self.source.facet_data(segment)?;
        Ok(match parse_range(cache.val_list(), &self.range)? {
            Some((start, end)) => {
                let (min_id, max_id) = doc_bounds(cache.as_ref(), start..=end);
                Box::new(FacetRangeDocIdSet {
                    cache,
                    start: start as i32,
                    end: end as i32,
                    min_id,
                    max_id,
                })
            }
            None => Box::new(EmptyDocIdSet),
        })
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let cache = self.source.facet_data(segment)?;
        Ok(match parse_range(cache.val_list(), &self.range)? {
            Some((start, end)) => freq_selectivity(cache.as_ref(), start..=end, false, self.clamp),
            None => 0.0,
        })
    }
}

// ============================================================================
// MultiValueFacetRangeFilter
// ============================================================================

/// Range over a multi-valued facet: a doc matches if any value is in range
pub struct MultiValueFacetRangeFilter {
    source: Arc<dyn FacetDataSource<MultiValueFacetDataCache>>,
    range: String,
    clamp: f64,
}

impl MultiValueFacetRangeFilter {
    /// Filter on `range`
    pub fn new(
        source: Arc<dyn FacetDataSource<MultiValueFacetDataCache>>,
        range: impl Into<String>,
    ) -> Self {
        Self {
            source,
            range: range.into(),
            clamp: DEFAULT_SELECTIVITY_CLAMP,
        }
    }

    /// Override the selectivity clamp
    pub fn with_selectivity_clamp(mut self, clamp: f64) -> Self {
        self.clamp = clamp;
        self
    }
}

struct MultiValueRangeDocIdSet {
    cache: Arc<MultiValueFacetDataCache>,
    start: i32,
    end: i32,
    min_id: DocId,
    max_id: DocId,
}

impl DocIdSet for MultiValueRangeDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        let nested = self.cache.nested_array();
        let (start, end) = (self.start, self.end);
        Box::new(FindIterator::new(self.min_id, self.max_id, move |from, max| {
            nested.find_values_in_range(start, end, from, max)
        }))
    }
}

impl RandomAccessDocIdSet for MultiValueRangeDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        in_segment(doc, self.cache.max_doc())
            && self
                .cache
                .nested_array()
                .contains_value_in_range(doc, self.start, self.end)
    }
}

impl RandomAccessFilter for MultiValueFacetRangeFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        let cache = self.source.facet_data(segment)?;
        Ok(match parse_range(cache.val_list(), &self.range)? {
            Some((start, end)) => {
                let (min_id, max_id) = doc_bounds(cache.as_ref(), start..=end);
                Box::new(MultiValueRangeDocIdSet {
                    cache,
                    start: start as i32,
                    end: end as i32,
                    min_id,
                    max_id,
                })
            }
            None => Box::new(EmptyDocIdSet),
        })
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let cache = self.source.facet_data(segment)?;
        Ok(match parse_range(cache.val_list(), &self.range)? {
            Some((start, end)) => freq_selectivity(cache.as_ref(), start..=end, false, self.clamp),
            None => 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docidset::collect_docs;
    use crate::testing::{assert_consistent, segment_with, sizes, strings};
    use facets_core::ValueKind;
    use facets_index::{MultiValueSource, SingleValueSource};
    use facets_storage::build_term_list;
    use proptest::prelude::*;

    fn size_filter(range: &str) -> FacetRangeFilter {
        FacetRangeFilter::new(
            Arc::new(SingleValueSource::new("size", "size", ValueKind::Int)),
            range,
        )
    }

    fn list(kind: ValueKind, values: &[&str]) -> Arc<dyn TermValueList> {
        build_term_list(kind, &strings(values)).unwrap().list
    }

    #[test]
    fn test_parse_forms() {
        let spec = RangeSpec::parse("[1 TO 5]").unwrap();
        assert_eq!(spec.lower.as_deref(), Some("1"));
        assert_eq!(spec.upper.as_deref(), Some("5"));
        assert!(spec.include_lower && spec.include_upper);

        let spec = RangeSpec::parse("  ( a  TO * ]").unwrap();
        assert_eq!(spec.lower.as_deref(), Some("a"));
        assert_eq!(spec.upper, None);
        assert!(!spec.include_lower && spec.include_upper);
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["1 TO 5]", "[1 TO 5", "[1 to 5]", "[1-5]", "[ TO 5]", "[", ""] {
            let err = RangeSpec::parse(bad).unwrap_err();
            assert!(matches!(err, FacetError::InvalidRange { .. }), "{}", bad);
        }
    }

    #[test]
    fn test_resolve_inclusive_exclusive() {
        // 1=10 2=20 3=30
        let l = list(ValueKind::Int, &["10", "20", "30"]);
        assert_eq!(parse_range(l.as_ref(), "[10 TO 30]").unwrap(), Some((1, 3)));
        assert_eq!(parse_range(l.as_ref(), "(10 TO 30)").unwrap(), Some((2, 2)));
        assert_eq!(parse_range(l.as_ref(), "[* TO *]").unwrap(), Some((1, 3)));
        assert_eq!(parse_range(l.as_ref(), "[15 TO 25]").unwrap(), Some((2, 2)));
        assert_eq!(parse_range(l.as_ref(), "[* TO 5]").unwrap(), None);
        assert_eq!(parse_range(l.as_ref(), "[31 TO *]").unwrap(), None);
        assert_eq!(parse_range(l.as_ref(), "(10 TO 20)").unwrap(), None);
        assert_eq!(parse_range(l.as_ref(), "[25 TO 15]").unwrap(), None);
    }

    #[test]
    fn test_resolve_unparsable_bound() {
        let l = list(ValueKind::Int, &["10"]);
        let err = parse_range(l.as_ref(), "[x TO 5]").unwrap_err();
        assert!(matches!(err, FacetError::InvalidValue { .. }));
    }

    #[test]
    fn test_size_buckets() {
        let segment = sizes();
        let small = size_filter("[* TO 4]").random_access_doc_id_set(&segment).unwrap();
        // sizes 4 2 3 1 are docs 0..=3
        assert_eq!(collect_docs(small.iterator()), vec![0, 1, 2, 3]);
        assert_consistent(small.as_ref(), segment.max_doc());

        let large = size_filter("[5 TO 8]").random_access_doc_id_set(&segment).unwrap();
        assert_eq!(collect_docs(large.iterator()), vec![4, 5, 6]);
        assert_consistent(large.as_ref(), segment.max_doc());
    }

    #[test]
    fn test_range_selectivity() {
        let segment = sizes();
        let s = size_filter("[5 TO 8]").selectivity(&segment).unwrap();
        assert!((s - 3.0 / 7.0).abs() < 1e-9);
        assert_eq!(size_filter("[100 TO *]").selectivity(&segment).unwrap(), 0.0);
    }

    #[test]
    fn test_multi_value_range() {
        let segment = segment_with(3, |seg| {
            seg.add_values(0, "year", &["1999", "2005"])
                .add_values(1, "year", &["2010"])
                .add_values(2, "year", &["1980"]);
        });
        let filter = MultiValueFacetRangeFilter::new(
            Arc::new(MultiValueSource::new("year", "year", ValueKind::Int)),
            "[2000 TO 2010)",
        );
        let set = filter.random_access_doc_id_set(&segment).unwrap();
        assert_eq!(collect_docs(set.iterator()), vec![0]);
        assert_consistent(set.as_ref(), segment.max_doc());
    }

    proptest! {
        #[test]
        fn prop_range_membership_matches_numeric_order(
            values in prop::collection::btree_set(-50i32..50, 1..20),
            lo in -60i32..60,
            hi in -60i32..60,
            include_lower in any::<bool>(),
            include_upper in any::<bool>(),
        ) {
            let terms: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            let l = build_term_list(ValueKind::Int, &terms).unwrap().list;
            let range = format!(
                "{}{} TO {}{}",
                if include_lower { "[" } else { "(" },
                lo,
                hi,
                if include_upper { "]" } else { ")" },
            );
            let resolved = parse_range(l.as_ref(), &range).unwrap();
            for index in 1..l.len() {
                let v: i32 = l.get(index).parse().unwrap();
                let above = if include_lower { v >= lo } else { v > lo };
                let below = if include_upper { v <= hi } else { v < hi };
                let inside = matches!(resolved, Some((s, e)) if index >= s && index <= e);
                prop_assert_eq!(inside, above && below, "value {} in {}", v, range);
            }
        }
    }
}
