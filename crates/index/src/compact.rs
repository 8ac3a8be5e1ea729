//! Bit-packed facet data for multi-valued fields with few distinct values
//!
//! Each document's values are stored as one 32-bit mask, value-index `i`
//! mapping to bit `i - 1`. A field with more than `MAX_COMPACT_VALUES`
//! distinct values cannot be represented and fails to load.

use crate::cache::{next_cache_id, record_missing, scan_field, StatsBuilder, ValueStats};
use crate::segment::LoadContext;
use facets_core::{DocId, FacetError, FacetResult, ValueKind};
use facets_storage::{build_term_list, BigIntArray, BigSegmentedArray, TermValueList};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Distinct values a compact field can hold
pub const MAX_COMPACT_VALUES: usize = 32;

/// Bit of value-index `index` (1-based) in a compact mask
#[inline]
pub fn compact_bit(index: usize) -> i32 {
    debug_assert!(index >= 1 && index <= MAX_COMPACT_VALUES);
    (1u32 << (index - 1)) as i32
}

/// Compact multi-valued facet data of one segment
pub struct CompactFacetDataCache {
    cache_id: u64,
    val_list: Arc<dyn TermValueList>,
    bits: BigIntArray,
    freqs: Vec<i32>,
    min_ids: Vec<DocId>,
    max_ids: Vec<DocId>,
    max_doc: usize,
}

impl CompactFacetDataCache {
    /// Build from the values of `field`
    ///
    /// # Errors
    ///
    /// Fails with `TooManyCompactValues` if the field has more than
    /// `MAX_COMPACT_VALUES` distinct values.
    pub fn load(ctx: &LoadContext<'_>, field: &str, kind: ValueKind) -> FacetResult<Self> {
        let scan = scan_field(ctx, field, false)?;
        let built = build_term_list(kind, &scan.terms)?;
        let num_values = built.list.len() - 1;
        if num_values > MAX_COMPACT_VALUES {
            return Err(FacetError::TooManyCompactValues {
                count: num_values,
                max: MAX_COMPACT_VALUES,
            });
        }

        let max_doc = ctx.reader().max_doc();
        let mut bits = BigIntArray::new(max_doc);
        let mut stats = StatsBuilder::new(built.list.len());
        for &(doc, pos) in &scan.entries {
            let index = built.indices[pos];
            let mask = bits.get(doc);
            let bit = compact_bit(index);
            if mask & bit == 0 {
                bits.add(doc, mask | bit);
                stats.record(index, doc);
            }
        }
        record_missing(&mut stats, max_doc, |doc| bits.get(doc) != 0);

        info!(
            target: "strata::facets",
            field,
            values = num_values,
            docs = max_doc,
            "Built compact facet data cache"
        );

        Ok(Self {
            cache_id: next_cache_id(),
            val_list: built.list,
            bits,
            freqs: stats.freqs,
            min_ids: stats.min_ids,
            max_ids: stats.max_ids,
            max_doc,
        })
    }

    /// Document → value mask mapping
    pub fn bits(&self) -> &BigIntArray {
        &self.bits
    }

    /// Shared handle to the value list
    pub fn val_list_arc(&self) -> Arc<dyn TermValueList> {
        self.val_list.clone()
    }

    /// Value-indices set in the mask of `doc`, ascending
    pub fn value_indices(&self, doc: DocId) -> impl Iterator<Item = usize> {
        let mut mask = self.bits.get(doc) as u32;
        std::iter::from_fn(move || {
            if mask == 0 {
                return None;
            }
            let bit = mask.trailing_zeros() as usize;
            mask &= mask - 1;
            Some(bit + 1)
        })
    }
}

impl ValueStats for CompactFacetDataCache {
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

impl fmt::Debug for CompactFacetDataCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompactFacetDataCache")
            .field("cache_id", &self.cache_id)
            .field("values", &self.val_list.len())
            .field("max_doc", &self.max_doc)
            .finish()
    }
}
