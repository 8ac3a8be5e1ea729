//! Facet Integration Tests
//!
//! End-to-end browse tests over a generated catalog, checked against
//! brute-force answers:
//! - browse: selections, counts and expansion on one segment
//! - handlers: range, compact and geo facets
//! - multi_segment: fan-out and merge across segments
//! - config: `facets.toml` round trips and tuning
//! - concurrency: shared segments under parallel browse

#[path = "../common/mod.rs"]
mod common;

mod browse;
mod concurrency;
mod config;
mod handlers;
mod multi_segment;
