//! Strata Facets - faceted browsing over segmented document indexes
//!
//! Strata Facets builds per-segment facet data from a field's postings,
//! filters documents by facet values through random-access doc id sets, and
//! counts facet values over the matching documents.
//!
//! # Quick Start
//!
//! ```ignore
//! use strata_facets::{
//!     BrowseRequest, BrowseSelection, FacetBrowser, FacetConfig, FacetHandlers,
//!     FacetSegment, FacetSpec, MemorySegment, SimpleFacetHandler, ValueKind,
//! };
//! use std::sync::Arc;
//!
//! let mut segment = MemorySegment::new(0, 3);
//! segment.add(0, "color", "red").add(1, "color", "blue").add(2, "color", "red");
//!
//! let handlers = FacetHandlers::new()
//!     .with(SimpleFacetHandler::new("color", "color", ValueKind::String));
//! let browser = FacetBrowser::new(
//!     Arc::new(FacetSegment::new(Arc::new(segment))),
//!     Arc::new(handlers),
//!     FacetConfig::default(),
//! );
//!
//! let request = BrowseRequest::new()
//!     .with_selection(BrowseSelection::new("color").with_value("red"))
//!     .with_facet_spec("color", FacetSpec::new());
//! let result = browser.browse(&request)?;
//! assert_eq!(result.num_hits, 2);
//! ```
//!
//! # Architecture
//!
//! - `facets-core`: document ids, value kinds, errors, configuration
//! - `facets-storage`: paged arrays, nested multi-value arrays, term lists
//! - `facets-index`: segment readers and per-segment facet data caches
//! - `facets-filter`: random-access facet filters and combinators
//! - `facets-browse`: handlers, count collection, merging, browsers

pub use facets_browse::*;
pub use facets_core::{DocId, FacetConfig, FacetError, FacetResult, GeoUnit, ValueKind, NO_MORE_DOCS};
pub use facets_filter::{Filter, RandomAccessFilter, TermFilter};
pub use facets_index::{
    CancelToken, FacetSegment, GeoSource, MemorySegment, SegmentReader, SingleValueSource,
};

pub use facets_core as types;
pub use facets_filter as filter;
pub use facets_index as index;
pub use facets_storage as storage;
