//! Core types for the faceting layer
//!
//! This crate defines the foundational types used throughout the system:
//! - DocId / NO_MORE_DOCS: document ordinals and the exhaustion sentinel
//! - ValueKind: typing of facet field values
//! - FacetError: error type hierarchy
//! - FacetConfig: tuning knobs loaded from `facets.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    clamp_selectivity, FacetConfig, GeoUnit, CONFIG_FILE_NAME, DEFAULT_MAX_ITEMS, DEFAULT_OR_THRESHOLD,
    DEFAULT_SELECTIVITY_CLAMP, EARTH_RADIUS_KM, EARTH_RADIUS_MILES, MAX_ITEMS_LIMIT,
};
pub use error::{FacetError, FacetResult};
pub use types::{DocId, ValueKind, MISSING_VALUE_INDEX, NO_MORE_DOCS};
