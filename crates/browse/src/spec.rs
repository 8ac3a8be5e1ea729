//! Browse request and result types
//!
//! This module defines the per-query types of a browse:
//! - BrowseSelection: values a facet is restricted to
//! - FacetSpec: how the counts of one facet are ordered and limited
//! - BrowseRequest: selections, facet specs and an optional base filter
//! - BrowseResult: matching documents plus ranked facet counts
//!
//! All of them are short-lived and built per query.

use facets_core::DocId;
use facets_filter::Filter;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// BrowseFacet
// ============================================================================

/// One facet value and the number of hits holding it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseFacet {
    /// Formatted value
    pub value: String,
    /// Matching documents holding the value
    pub hit_count: u64,
}

impl BrowseFacet {
    /// Create a facet entry
    pub fn new(value: impl Into<String>, hit_count: u64) -> Self {
        Self {
            value: value.into(),
            hit_count,
        }
    }
}

// ============================================================================
// FacetSpec
// ============================================================================

/// Comparator for `FacetSortOrder::Custom`
pub type FacetComparator = Arc<dyn Fn(&BrowseFacet, &BrowseFacet) -> Ordering + Send + Sync>;

/// Order of the entries of a facet
///
/// Ties in every order are broken by value order.
#[derive(Clone, Default)]
pub enum FacetSortOrder {
    /// Field value order
    #[default]
    ValueAscending,
    /// Most hits first
    HitsDescending,
    /// Caller-supplied order
    Custom(FacetComparator),
}

impl fmt::Debug for FacetSortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacetSortOrder::ValueAscending => f.write_str("ValueAscending"),
            FacetSortOrder::HitsDescending => f.write_str("HitsDescending"),
            FacetSortOrder::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Ordering and limits for the counts of one facet
///
/// # Default Values
///
/// - order: value ascending
/// - max_count: 0 (unlimited)
/// - min_hit_count: 1
/// - expand_selection: false
#[derive(Debug, Clone)]
pub struct FacetSpec {
    /// Entry order
    pub order: FacetSortOrder,
    /// Maximum entries returned, 0 for all
    pub max_count: usize,
    /// Entries with fewer hits are dropped
    pub min_hit_count: u64,
    /// Count this facet as if its own selection were not applied
    pub expand_selection: bool,
}

impl Default for FacetSpec {
    fn default() -> Self {
        Self {
            order: FacetSortOrder::ValueAscending,
            max_count: 0,
            min_hit_count: 1,
            expand_selection: false,
        }
    }
}

impl FacetSpec {
    /// Spec with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the entry order
    pub fn with_order(mut self, order: FacetSortOrder) -> Self {
        self.order = order;
        self
    }

    /// Builder: set the maximum number of entries
    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    /// Builder: set the minimum hit count
    pub fn with_min_hit_count(mut self, min_hit_count: u64) -> Self {
        self.min_hit_count = min_hit_count;
        self
    }

    /// Builder: set expand-selection counting
    pub fn with_expand_selection(mut self, expand: bool) -> Self {
        self.expand_selection = expand;
        self
    }

    /// Filter, sort and truncate `facets`
    ///
    /// `value_order` is the field's natural value order, used by
    /// `ValueAscending` and to break ties.
    pub fn apply(
        &self,
        mut facets: Vec<BrowseFacet>,
        value_order: &dyn Fn(&str, &str) -> Ordering,
    ) -> Vec<BrowseFacet> {
        facets.retain(|f| f.hit_count >= self.min_hit_count);
        facets.sort_by(|a, b| self.compare(a, b, value_order));
        if self.max_count > 0 {
            facets.truncate(self.max_count);
        }
        facets
    }

    fn compare(
        &self,
        a: &BrowseFacet,
        b: &BrowseFacet,
        value_order: &dyn Fn(&str, &str) -> Ordering,
    ) -> Ordering {
        let primary = match &self.order {
            FacetSortOrder::ValueAscending => Ordering::Equal,
            FacetSortOrder::HitsDescending => b.hit_count.cmp(&a.hit_count),
            FacetSortOrder::Custom(cmp) => cmp(a, b),
        };
        primary.then_with(|| value_order(&a.value, &b.value))
    }
}

// ============================================================================
// BrowseSelection
// ============================================================================

/// How the values of one selection combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueOperation {
    /// Any selected value matches
    #[default]
    Or,
    /// Every selected value must be held (multi-valued facets)
    And,
}

/// Restriction of one facet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseSelection {
    facet: String,
    values: Vec<String>,
    not_values: Vec<String>,
    operation: ValueOperation,
}

impl BrowseSelection {
    /// Empty selection on `facet`
    pub fn new(facet: impl Into<String>) -> Self {
        Self {
            facet: facet.into(),
            values: Vec::new(),
            not_values: Vec::new(),
            operation: ValueOperation::Or,
        }
    }

    /// Builder: add a selected value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Builder: add an excluded value
    pub fn with_not_value(mut self, value: impl Into<String>) -> Self {
        self.not_values.push(value.into());
        self
    }

    /// Builder: set how selected values combine
    pub fn with_operation(mut self, operation: ValueOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Facet name
    pub fn facet(&self) -> &str {
        &self.facet
    }

    /// Selected values
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Excluded values
    pub fn not_values(&self) -> &[String] {
        &self.not_values
    }

    /// Value combination
    pub fn operation(&self) -> ValueOperation {
        self.operation
    }

    /// True if the selection restricts nothing
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.not_values.is_empty()
    }
}

// ============================================================================
// BrowseRequest
// ============================================================================

/// A browse query
#[derive(Clone)]
pub struct BrowseRequest {
    /// Facet selections, AND-ed together
    pub selections: Vec<BrowseSelection>,
    /// Facets to count, by name
    pub facet_specs: BTreeMap<String, FacetSpec>,
    /// Filter from the search layer, AND-ed with the selections
    pub filter: Option<Arc<dyn Filter>>,
    /// Hits to skip
    pub offset: usize,
    /// Hits to return
    pub count: usize,
}

impl Default for BrowseRequest {
    fn default() -> Self {
        Self {
            selections: Vec::new(),
            facet_specs: BTreeMap::new(),
            filter: None,
            offset: 0,
            count: 10,
        }
    }
}

impl fmt::Debug for BrowseRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowseRequest")
            .field("selections", &self.selections)
            .field("facet_specs", &self.facet_specs)
            .field("filter", &self.filter.is_some())
            .field("offset", &self.offset)
            .field("count", &self.count)
            .finish()
    }
}

impl BrowseRequest {
    /// Request returning the first 10 hits and no facets
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a selection
    pub fn with_selection(mut self, selection: BrowseSelection) -> Self {
        self.selections.push(selection);
        self
    }

    /// Builder: count `facet` according to `spec`
    pub fn with_facet_spec(mut self, facet: impl Into<String>, spec: FacetSpec) -> Self {
        self.facet_specs.insert(facet.into(), spec);
        self
    }

    /// Builder: restrict to documents of a search-layer filter
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Builder: set the hit window
    pub fn with_window(mut self, offset: usize, count: usize) -> Self {
        self.offset = offset;
        self.count = count;
        self
    }
}

// ============================================================================
// BrowseResult
// ============================================================================

/// A matching document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BrowseHit {
    /// Segment the document belongs to
    pub segment_id: u64,
    /// Document within the segment
    pub doc: DocId,
}

/// Outcome of a browse
#[derive(Debug, Clone, Default)]
pub struct BrowseResult {
    /// Total matching documents
    pub num_hits: usize,
    /// Requested window of matching documents
    pub hits: Vec<BrowseHit>,
    /// Ranked entries per counted facet
    pub facets: BTreeMap<String, Vec<BrowseFacet>>,
}

impl BrowseResult {
    /// Entries of `facet`, empty if it was not counted
    pub fn facet(&self, facet: &str) -> &[BrowseFacet] {
        self.facets.get(facet).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Hit count of `value` in `facet`, 0 if absent
    pub fn hit_count(&self, facet: &str, value: &str) -> u64 {
        self.facet(facet)
            .iter()
            .find(|f| f.value == value)
            .map_or(0, |f| f.hit_count)
    }
}
