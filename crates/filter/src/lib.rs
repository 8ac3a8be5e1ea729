//! Facet filters
//!
//! This crate turns facet selections into per-segment document sets:
//! - DocIdSet / RandomAccessDocIdSet: iterable and membership-testable results
//! - Filter / RandomAccessFilter: per-segment filter contracts with selectivity
//! - Value filters: equality, OR, range, compact bitmask, adaptive postings
//! - Boolean combinators, random-access and opaque
//! - Geo filters over unit-sphere points or latitude/longitude boxes
//!
//! For every random-access set, iteration yields exactly the documents for
//! which `get` is true, in increasing order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adaptive;
pub mod bitset_cache;
pub mod boolean;
pub mod compact;
pub mod docidset;
pub mod facet;
pub mod filter;
pub mod geo;
pub mod or;
pub mod range;
pub mod selectivity;
pub mod term;

#[cfg(test)]
mod testing;

pub use adaptive::AdaptiveFacetFilter;
pub use bitset_cache::BitSetCache;
pub use boolean::{
    AndFilter, NotFilter, OrFilter, RandomAccessAndFilter, RandomAccessNotFilter,
    RandomAccessOrFilter,
};
pub use compact::CompactMultiValueFacetFilter;
pub use docidset::{
    collect_docs, AllDocIdSet, BitmapDocIdSet, DocIdSet, DocIdSetIterator, EmptyDocIdSet,
    FindIterator, RandomAccessAsDocIdSet, RandomAccessDocIdSet,
};
pub use facet::{FacetFilter, MultiValueFacetFilter};
pub use filter::{
    EmptyFilter, Filter, MatchAllFilter, RandomAccessFilter, RandomAccessFilterAdapter,
    DEFAULT_SELECTIVITY,
};
pub use geo::{parse_geo_range, GeoFacetFilter, GeoSimpleFacetFilter};
pub use or::{value_bitset, FacetOrFilter, MultiValueOrFacetFilter};
pub use range::{parse_range, FacetRangeFilter, MultiValueFacetRangeFilter, RangeSpec};
pub use selectivity::{doc_bounds, freq_selectivity, freq_sum};
pub use term::TermFilter;
