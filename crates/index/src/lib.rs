//! Per-segment facet data
//!
//! This crate builds and owns the data facets are computed from:
//! - SegmentReader: seam to the underlying index (values and postings)
//! - FacetSegment: a segment plus its lazily built, shared facet caches
//! - FacetDataCache: single-valued doc → value-index mapping and statistics
//! - MultiValueFacetDataCache: nested-array backed multi-valued mapping
//! - CompactFacetDataCache: bitmask mapping for fields with ≤32 values
//! - GeoFacetData: unit-sphere coordinates for distance filters
//! - FacetDataSource: named loaders handlers and filters obtain data through

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod compact;
pub mod geo;
pub mod multi;
pub mod segment;
pub mod source;

pub use cache::{FacetDataCache, ValueStats};
pub use compact::{compact_bit, CompactFacetDataCache, MAX_COMPACT_VALUES};
pub use geo::{to_unit_sphere, GeoFacetData, MISSING_COORD};
pub use multi::MultiValueFacetDataCache;
pub use segment::{
    CancelToken, FacetSegment, FieldValue, FieldValues, LoadContext, MemorySegment, SegmentReader,
};
pub use source::{
    CompactSource, FacetDataSource, GeoSource, MultiValueSource, SingleValueSource,
    ValueStatsSource,
};
