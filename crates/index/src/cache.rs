//! Per-segment facet data for single-valued fields
//!
//! A `FacetDataCache` maps every document of a segment to the value-index of
//! its single value (0 when it has none) and keeps per-value statistics:
//! document frequency plus the smallest and largest document holding the
//! value. Filters use the statistics to estimate selectivity and to bound
//! their scans.

use crate::segment::LoadContext;
use facets_core::{DocId, FacetError, FacetResult, ValueKind, NO_MORE_DOCS};
use facets_storage::{build_term_list, new_order_array, BigSegmentedArray, TermValueList};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a built cache
pub(crate) fn next_cache_id() -> u64 {
    NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed)
}

/// How often loaders poll the cancel token, in field values
pub(crate) const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Per-value statistics shared by every facet cache flavour
pub trait ValueStats: Send + Sync {
    /// Distinct values of the field
    fn val_list(&self) -> &dyn TermValueList;

    /// `freqs[i]` = documents holding value-index `i`; index 0 counts docs without a value
    fn freqs(&self) -> &[i32];

    /// Smallest document holding each value-index, `NO_MORE_DOCS` if none
    fn min_ids(&self) -> &[DocId];

    /// Largest document holding each value-index, -1 if none
    fn max_ids(&self) -> &[DocId];

    /// Documents in the segment
    fn max_doc(&self) -> usize;

    /// Identity of this build, unique within the process
    fn cache_id(&self) -> u64;
}

/// Frequencies and doc bounds accumulated while loading
pub(crate) struct StatsBuilder {
    pub freqs: Vec<i32>,
    pub min_ids: Vec<DocId>,
    pub max_ids: Vec<DocId>,
}

impl StatsBuilder {
    pub fn new(num_values: usize) -> Self {
        Self {
            freqs: vec![0; num_values],
            min_ids: vec![NO_MORE_DOCS; num_values],
            max_ids: vec![-1; num_values],
        }
    }

    #[inline]
    pub fn record(&mut self, index: usize, doc: DocId) {
        self.freqs[index] += 1;
        self.min_ids[index] = self.min_ids[index].min(doc);
        self.max_ids[index] = self.max_ids[index].max(doc);
    }
}

/// Distinct raw terms of a field plus the doc-ordered (doc, term) entries
pub(crate) struct FieldScan {
    pub terms: Vec<String>,
    pub entries: Vec<(DocId, usize)>,
}

/// Read every value of `field`, interning terms
///
/// With `single` set, a second value for the same document fails with
/// `MultipleValues`.
///
/// # Panics
///
/// Panics if the reader yields documents out of order.
pub(crate) fn scan_field(ctx: &LoadContext<'_>, field: &str, single: bool) -> FacetResult<FieldScan> {
    let reader = ctx.reader();
    let max_doc = reader.max_doc();
    let mut interned: FxHashMap<String, usize> = FxHashMap::default();
    let mut terms = Vec::new();
    let mut entries = Vec::new();
    let mut prev: DocId = -1;

    for (n, pair) in reader.field_values(field).enumerate() {
        if n % CANCEL_CHECK_INTERVAL == 0 {
            ctx.check_cancelled()?;
        }
        let (doc, term) = pair?;
        if doc < 0 || doc as usize >= max_doc {
            return Err(ctx.segment_error(format!(
                "field '{}' reports doc {} outside 0..{}",
                field, doc, max_doc
            )));
        }
        assert!(
            doc >= prev,
            "field '{}' values out of doc order: {} after {}",
            field,
            doc,
            prev
        );
        if single && doc == prev {
            return Err(FacetError::MultipleValues {
                field: field.to_string(),
                doc,
            });
        }
        prev = doc;

        let pos = match interned.get(&term) {
            Some(&pos) => pos,
            None => {
                let pos = terms.len();
                interned.insert(term.clone(), pos);
                terms.push(term);
                pos
            }
        };
        entries.push((doc, pos));
    }
    Ok(FieldScan { terms, entries })
}

/// Fill the index-0 statistics from the docs that received no value
pub(crate) fn record_missing(
    stats: &mut StatsBuilder,
    max_doc: usize,
    mut has_value: impl FnMut(DocId) -> bool,
) {
    for doc in 0..max_doc as DocId {
        if !has_value(doc) {
            stats.record(0, doc);
        }
    }
}

// ============================================================================
// FacetDataCache
// ============================================================================

/// Single-valued facet data of one segment
pub struct FacetDataCache {
    cache_id: u64,
    val_list: Arc<dyn TermValueList>,
    order_array: Box<dyn BigSegmentedArray>,
    freqs: Vec<i32>,
    min_ids: Vec<DocId>,
    max_ids: Vec<DocId>,
    max_doc: usize,
}

impl FacetDataCache {
    /// Build from the values of `field`
    ///
    /// # Errors
    ///
    /// Fails with `MultipleValues` if a document holds two values,
    /// `InvalidValue` if a numeric term does not parse, and propagates reader
    /// failures.
    pub fn load(ctx: &LoadContext<'_>, field: &str, kind: ValueKind) -> FacetResult<Self> {
        let scan = scan_field(ctx, field, true)?;
        let built = build_term_list(kind, &scan.terms)?;
        let max_doc = ctx.reader().max_doc();

        let mut order_array = new_order_array(built.list.len(), max_doc);
        let mut stats = StatsBuilder::new(built.list.len());
        for &(doc, pos) in &scan.entries {
            let index = built.indices[pos];
            order_array.try_add(doc, index as i32)?;
            stats.record(index, doc);
        }
        record_missing(&mut stats, max_doc, |doc| order_array.get(doc) != 0);

        info!(
            target: "strata::facets",
            field,
            values = built.list.len() - 1,
            docs = max_doc,
            "Built facet data cache"
        );

        Ok(Self {
            cache_id: next_cache_id(),
            val_list: built.list,
            order_array,
            freqs: stats.freqs,
            min_ids: stats.min_ids,
            max_ids: stats.max_ids,
            max_doc,
        })
    }

    /// Document → value-index mapping
    pub fn order_array(&self) -> &dyn BigSegmentedArray {
        self.order_array.as_ref()
    }

    /// Shared handle to the value list
    pub fn val_list_arc(&self) -> Arc<dyn TermValueList> {
        self.val_list.clone()
    }

    /// Value-index of document `doc`
    #[inline]
    pub fn value_index(&self, doc: DocId) -> i32 {
        self.order_array.get(doc)
    }

    /// Numeric value of document `doc`, `None` if missing or not numeric
    pub fn raw_value(&self, doc: DocId) -> Option<f64> {
        match self.order_array.get(doc) {
            0 => None,
            index => self.val_list.raw_f64(index as usize),
        }
    }
}

impl ValueStats for FacetDataCache {
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

impl fmt::Debug for FacetDataCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacetDataCache")
            .field("cache_id", &self.cache_id)
            .field("values", &self.val_list.len())
            .field("max_doc", &self.max_doc)
            .finish()
    }
}
