//! Per-segment facet data for multi-valued fields

use crate::cache::{next_cache_id, record_missing, scan_field, StatsBuilder, ValueStats};
use crate::segment::LoadContext;
use facets_core::{DocId, FacetResult, ValueKind};
use facets_storage::{build_term_list, BigNestedIntArray, NestedArrayBuilder, TermValueList};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Multi-valued facet data of one segment
///
/// Each document's value-indices are stored sorted and without duplicates.
/// `freqs[i]` counts documents holding value `i`, so the frequencies of a
/// multi-valued field may sum to more than `max_doc`.
pub struct MultiValueFacetDataCache {
    cache_id: u64,
    val_list: Arc<dyn TermValueList>,
    nested: BigNestedIntArray,
    freqs: Vec<i32>,
    min_ids: Vec<DocId>,
    max_ids: Vec<DocId>,
    max_doc: usize,
}

impl MultiValueFacetDataCache {
    /// Build from the values of `field`, allowing up to `max_items` per document
    ///
    /// # Errors
    ///
    /// Fails with `TooManyValues` or `PageOverflow` when the nested array
    /// runs out of room, `InvalidValue` if a numeric term does not parse, and
    /// propagates reader failures.
    pub fn load(
        ctx: &LoadContext<'_>,
        field: &str,
        kind: ValueKind,
        max_items: usize,
    ) -> FacetResult<Self> {
        let scan = scan_field(ctx, field, false)?;
        let built = build_term_list(kind, &scan.terms)?;
        let max_doc = ctx.reader().max_doc();
        let mut stats = StatsBuilder::new(built.list.len());

        let mut builder = NestedArrayBuilder::new(max_doc, max_items)?;
        let mut doc_values: Vec<i32> = Vec::new();
        let mut start = 0;
        while start < scan.entries.len() {
            let doc = scan.entries[start].0;
            let end = start
                + scan.entries[start..]
                    .iter()
                    .take_while(|(d, _)| *d == doc)
                    .count();

            doc_values.clear();
            doc_values.extend(
                scan.entries[start..end]
                    .iter()
                    .map(|&(_, pos)| built.indices[pos] as i32),
            );
            doc_values.sort_unstable();
            doc_values.dedup();

            builder.add_data(doc, &doc_values)?;
            for &index in &doc_values {
                stats.record(index as usize, doc);
            }
            start = end;
        }
        let nested = builder.finish()?;
        record_missing(&mut stats, max_doc, |doc| nested.num_items(doc) > 0);

        info!(
            target: "strata::facets",
            field,
            values = built.list.len() - 1,
            docs = max_doc,
            "Built multi-value facet data cache"
        );

        Ok(Self {
            cache_id: next_cache_id(),
            val_list: built.list,
            nested,
            freqs: stats.freqs,
            min_ids: stats.min_ids,
            max_ids: stats.max_ids,
            max_doc,
        })
    }

    /// Document → value-indices mapping
    pub fn nested_array(&self) -> &BigNestedIntArray {
        &self.nested
    }

    /// Shared handle to the value list
    pub fn val_list_arc(&self) -> Arc<dyn TermValueList> {
        self.val_list.clone()
    }

    /// Formatted values of document `doc`
    pub fn doc_values(&self, doc: DocId) -> Vec<String> {
        self.nested
            .values(doc)
            .iter()
            .map(|&index| self.val_list.get(index as usize))
            .collect()
    }
}

impl ValueStats for MultiValueFacetDataCache {
    fn val_list(&self) -> &dyn TermValueList {
        self.val_list.as_ref()
    }

    fn freqs(&self) -> &[i32] {
        &self.freqs
    }

    fn min_ids(&self) -> &[DocId] {
        &self.min_ids
    }

    fn max_ids(&self) -> &[DocId] {
        &self.max_ids
    }

    fn max_doc(&self) -> usize {
        self.max_doc
    }

    fn cache_id(&self) -> u64 {
        self.cache_id
    }
}

impl fmt::Debug for MultiValueFacetDataCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiValueFacetDataCache")
            .field("cache_id", &self.cache_id)
            .field("values", &self.val_list.len())
            .field("nested", &self.nested)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{FacetSegment, MemorySegment};
    use facets_core::FacetError;

    fn tags() -> FacetSegment {
        let mut seg = MemorySegment::new(0, 3);
        seg.add_values(0, "tag", &["rabbit", "pet", "animal"])
            .add_values(1, "tag", &["dog", "pet", "poodle", "pet"]);
        FacetSegment::new(Arc::new(seg))
    }

    fn load(segment: &FacetSegment, max_items: usize) -> FacetResult<Arc<MultiValueFacetDataCache>> {
        segment.get_or_load("tag", "multi-valued", |ctx| {
            MultiValueFacetDataCache::load(ctx, "tag", ValueKind::String, max_items)
        })
    }

    #[test]
    fn test_values_sorted_and_deduped() {
        let segment = tags();
        let cache = load(&segment, 16).unwrap();
        // animal=1 dog=2 pet=3 poodle=4 rabbit=5
        assert_eq!(cache.nested_array().values(0), &[1, 3, 5]);
        assert_eq!(cache.nested_array().values(1), &[2, 3, 4]);
        assert_eq!(cache.nested_array().values(2), &[] as &[i32]);
        assert_eq!(cache.doc_values(1), vec!["dog", "pet", "poodle"]);
    }

    #[test]
    fn test_stats() {
        let segment = tags();
        let cache = load(&segment, 16).unwrap();
        assert_eq!(cache.freqs(), &[1, 1, 1, 2, 1, 1]);
        assert_eq!(cache.min_ids()[3], 0);
        assert_eq!(cache.max_ids()[3], 1);
        assert_eq!(cache.min_ids()[0], 2);
    }

    #[test]
    fn test_max_items_exceeded_fails_load() {
        let segment = tags();
        let err = load(&segment, 2).unwrap_err();
        assert!(err.is_capacity_error());
        assert!(matches!(err, FacetError::Load { .. }));
    }
}
