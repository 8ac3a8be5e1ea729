//! Merging facet counts across segments
//!
//! Partial counts are summed by value, then the facet spec is applied once to
//! the merged list, using the same value order the segments used.

use crate::spec::{BrowseFacet, FacetSpec};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

/// Sum `lists` by value and rank the result with `spec`
///
/// Lists are expected unranked (every value, zero counts included) so that
/// `min_hit_count` and `max_count` act on merged totals.
pub fn merge_facets(
    lists: impl IntoIterator<Item = Vec<BrowseFacet>>,
    spec: &FacetSpec,
    value_order: &dyn Fn(&str, &str) -> Ordering,
) -> Vec<BrowseFacet> {
    let mut totals: FxHashMap<String, u64> = FxHashMap::default();
    for facet in lists.into_iter().flatten() {
        *totals.entry(facet.value).or_insert(0) += facet.hit_count;
    }
    let merged = totals
        .into_iter()
        .map(|(value, hit_count)| BrowseFacet { value, hit_count })
        .collect();
    spec.apply(merged, value_order)
}
