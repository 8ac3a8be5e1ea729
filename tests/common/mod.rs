//! Shared test utilities for the facet integration suites.
//!
//! Provides a deterministic product catalog, segment builders over it, and
//! brute-force answers to compare browse results against.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Once};
use strata_facets::{
    BrowseResult, DocId, FacetConfig, FacetHandlers, FacetSegment, GeoSource, MemorySegment,
    SingleValueSource, ValueKind,
};
use strata_facets::{
    CompactMultiValueFacetHandler, GeoFacetHandler, GeoSimpleFacetHandler, MultiValueFacetHandler,
    RangeFacetHandler, SimpleFacetHandler,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Install a test tracing subscriber once per test binary.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// Catalog
// ============================================================================

pub const COLORS: [&str; 4] = ["black", "blue", "red", "white"];
pub const TAGS: [&str; 5] = ["eco", "new", "pet", "sale", "wide"];
pub const SIZE_RANGES: [&str; 3] = ["[* TO 5]", "[6 TO 12]", "(12 TO *]"];

/// One catalog document
#[derive(Debug, Clone)]
pub struct Row {
    pub color: Option<&'static str>,
    pub size: i32,
    pub tags: Vec<&'static str>,
    pub location: Option<(f64, f64)>,
}

/// Deterministic catalog of `n` rows
///
/// Every 11th row has no color, every 13th no location, and tags follow a
/// multiplicative hash so that some rows have none.
pub fn catalog(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            let color = (i % 11 != 10).then(|| COLORS[i % COLORS.len()]);
            let size = ((i * 7) % 20 + 1) as i32;
            let hash = (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 59;
            let tags = TAGS
                .iter()
                .enumerate()
                .filter(|(k, _)| hash & (1 << k) != 0)
                .map(|(_, t)| *t)
                .collect();
            let location = (i % 13 != 12).then(|| {
                (37.0 + (i % 10) as f64 * 0.1, -122.0 - (i % 7) as f64 * 0.1)
            });
            Row {
                color,
                size,
                tags,
                location,
            }
        })
        .collect()
}

/// Segment `id` holding `rows`
pub fn segment(id: u64, rows: &[Row]) -> Arc<FacetSegment> {
    let mut seg = MemorySegment::new(id, rows.len());
    for (doc, row) in rows.iter().enumerate() {
        let doc = doc as DocId;
        if let Some(color) = row.color {
            seg.add(doc, "color", color);
        }
        seg.add(doc, "size", &row.size.to_string());
        seg.add_values(doc, "tag", &row.tags);
        if let Some((lat, lon)) = row.location {
            seg.add(doc, "lat", &lat.to_string());
            seg.add(doc, "lon", &lon.to_string());
        }
    }
    Arc::new(FacetSegment::new(Arc::new(seg)))
}

/// Split `rows` into segments of at most `per_segment` rows
pub fn segments(rows: &[Row], per_segment: usize) -> Vec<Arc<FacetSegment>> {
    rows.chunks(per_segment)
        .enumerate()
        .map(|(id, chunk)| segment(id as u64, chunk))
        .collect()
}

/// Handlers for every catalog facet
///
/// - `color`: simple string facet
/// - `size`: simple int facet, `size_range`: predefined size ranges
/// - `tag`: multi-valued, `tag_bits`: the same field as a compact facet
/// - `near`: geo circles, `near_box`: geo boxes
pub fn handlers(config: &FacetConfig) -> Arc<FacetHandlers> {
    let size = || SingleValueSource::new("size", "size", ValueKind::Int);
    let lat = || SingleValueSource::new("lat", "lat", ValueKind::Double);
    let lon = || SingleValueSource::new("lon", "lon", ValueKind::Double);
    let ranges = SIZE_RANGES.iter().map(|r| r.to_string()).collect();
    let circles = vec!["<37.0, -122.0, 5>".to_string(), "<37.4, -122.3, 200>".to_string()];

    Arc::new(
        FacetHandlers::new()
            .with(SimpleFacetHandler::new("color", "color", ValueKind::String).with_config(config))
            .with(SimpleFacetHandler::new("size", "size", ValueKind::Int).with_config(config))
            .with(RangeFacetHandler::new("size_range", size(), ranges).unwrap().with_config(config))
            .with(MultiValueFacetHandler::new("tag", "tag", ValueKind::String).with_config(config))
            .with(
                CompactMultiValueFacetHandler::new("tag_bits", "tag", ValueKind::String)
                    .with_config(config),
            )
            .with(
                GeoFacetHandler::new("near", GeoSource::new("geo", lat(), lon()), circles.clone())
                    .unwrap()
                    .with_config(config),
            )
            .with(
                GeoSimpleFacetHandler::new("near_box", lat(), lon(), circles)
                    .unwrap()
                    .with_config(config),
            ),
    )
}

// ============================================================================
// Brute-force answers
// ============================================================================

/// Doc ids of rows matching `pred`
pub fn naive_hits(rows: &[Row], pred: impl Fn(&Row) -> bool) -> Vec<DocId> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| pred(row))
        .map(|(doc, _)| doc as DocId)
        .collect()
}

/// Per-value counts over `hits` of the values `values_of` extracts
pub fn naive_counts(
    rows: &[Row],
    hits: &[DocId],
    values_of: impl Fn(&Row) -> Vec<String>,
) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for &doc in hits {
        for value in values_of(&rows[doc as usize]) {
            *counts.entry(value).or_insert(0) += 1;
        }
    }
    counts
}

/// Color of a row as a value list
pub fn color_of(row: &Row) -> Vec<String> {
    row.color.map(|c| vec![c.to_string()]).unwrap_or_default()
}

/// Tags of a row as a value list
pub fn tags_of(row: &Row) -> Vec<String> {
    row.tags.iter().map(|t| t.to_string()).collect()
}

/// Counts of `facet` in `result`, as a map
pub fn facet_counts(result: &BrowseResult, facet: &str) -> BTreeMap<String, u64> {
    result
        .facet(facet)
        .iter()
        .map(|f| (f.value.clone(), f.hit_count))
        .collect()
}

/// Doc ids of the hits of `result`
pub fn hit_docs(result: &BrowseResult) -> Vec<DocId> {
    result.hits.iter().map(|h| h.doc).collect()
}
