//! Faceted browse
//!
//! This crate answers browse requests over facet data:
//! - FacetHandler: per-facet selection filters, count collectors, value order
//! - FacetSpec / BrowseRequest / BrowseResult: per-query request and result
//! - FacetCountCollector: per-segment value histograms
//! - merge_facets: cross-segment count merging
//! - FacetBrowser / MultiFacetBrowser: single- and multi-segment browsing

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod browser;
pub mod collector;
pub mod handler;
pub mod merge;
pub mod spec;

pub use browser::{FacetBrowser, MultiFacetBrowser, SegmentBrowse};
pub use collector::{
    CompactFacetCountCollector, DefaultFacetCountCollector, FacetCountCollector,
    FilterFacetCountCollector, MultiValueFacetCountCollector, RangeFacetCountCollector,
};
pub use handler::{
    CompactMultiValueFacetHandler, FacetHandler, FacetHandlers, GeoFacetHandler,
    GeoSimpleFacetHandler, MultiValueFacetHandler, RangeFacetHandler, SimpleFacetHandler,
};
pub use merge::merge_facets;
pub use spec::{
    BrowseFacet, BrowseHit, BrowseRequest, BrowseResult, BrowseSelection, FacetComparator,
    FacetSortOrder, FacetSpec, ValueOperation,
};
