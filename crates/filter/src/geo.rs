//! Radius filters
//!
//! `GeoFacetFilter` works on precomputed unit-sphere points: a document is
//! within `radius` of the target when the chord between the two points is at
//! most `2 * sin(angle / 2)`, with `angle = radius / earth_radius`. Stored
//! points are f32, so the bound carries a few ULPs of slack. A cube of the
//! same half-width around the target is checked first; no coordinate differs
//! by more than the chord, so the cube never rejects a match.
//!
//! `GeoSimpleFacetFilter` skips the sphere and matches a latitude/longitude
//! box straight on the two numeric facets. It does not wrap around the
//! antimeridian.
//!
//! Both parse ranges of the form `<lat, lon, radius>`.

use crate::docidset::{
    in_segment, DocIdSet, DocIdSetIterator, EmptyDocIdSet, FindIterator, RandomAccessDocIdSet,
};
use crate::filter::{RandomAccessFilter, DEFAULT_SELECTIVITY};
use crate::selectivity::{doc_bounds, freq_selectivity};
use facets_core::{
    DocId, FacetError, FacetResult, GeoUnit, DEFAULT_SELECTIVITY_CLAMP, NO_MORE_DOCS,
};
use facets_index::{
    to_unit_sphere, FacetDataCache, FacetDataSource, FacetSegment, GeoFacetData, ValueStats,
};
use facets_storage::TermValueList;
use std::sync::Arc;

/// Parse `<lat, lon, radius>` into its three numbers
///
/// # Errors
///
/// Returns `InvalidRange` for missing brackets, a wrong number of parts, an
/// unparsable number or a negative radius.
pub fn parse_geo_range(range: &str) -> FacetResult<(f64, f64, f64)> {
    let inner = range
        .trim()
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .ok_or_else(|| FacetError::invalid_range(range, "must be enclosed in '<' and '>'"))?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(FacetError::invalid_range(
            range,
            format!("expected 3 comma separated numbers, got {}", parts.len()),
        ));
    }
    let mut numbers = [0.0; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| FacetError::invalid_range(range, format!("'{}' is not a number", part)))?;
    }
    let [lat, lon, radius] = numbers;
    if radius < 0.0 {
        return Err(FacetError::invalid_range(range, "radius must not be negative"));
    }
    Ok((lat, lon, radius))
}

/// Degrees of latitude spanned by `radius`
fn latitude_degrees(radius: f64, unit: GeoUnit) -> f64 {
    radius / (unit.earth_radius() * std::f64::consts::PI / 180.0)
}

// ============================================================================
// GeoFacetFilter
// ============================================================================

/// Documents within a radius of a point, on the unit sphere
pub struct GeoFacetFilter {
    source: Arc<dyn FacetDataSource<GeoFacetData>>,
    latitude: Option<Arc<dyn FacetDataSource<FacetDataCache>>>,
    lat: f64,
    lon: f64,
    radius: f64,
    unit: GeoUnit,
    clamp: f64,
}

impl GeoFacetFilter {
    /// Documents within `radius` kilometers of (`lat`, `lon`)
    pub fn new(source: Arc<dyn FacetDataSource<GeoFacetData>>, lat: f64, lon: f64, radius: f64) -> Self {
        Self {
            source,
            latitude: None,
            lat,
            lon,
            radius,
            unit: GeoUnit::Km,
            clamp: DEFAULT_SELECTIVITY_CLAMP,
        }
    }

    /// Filter from a `<lat, lon, radius>` range string
    pub fn from_range(source: Arc<dyn FacetDataSource<GeoFacetData>>, range: &str) -> FacetResult<Self> {
        let (lat, lon, radius) = parse_geo_range(range)?;
        Ok(Self::new(source, lat, lon, radius))
    }

    /// Interpret the radius in `unit`
    pub fn with_unit(mut self, unit: GeoUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Estimate selectivity from the latitude band of the circle
    ///
    /// Without a latitude facet the estimate is `DEFAULT_SELECTIVITY`.
    pub fn with_latitude(mut self, latitude: Arc<dyn FacetDataSource<FacetDataCache>>) -> Self {
        self.latitude = Some(latitude);
        self
    }

    /// Override the selectivity clamp
    pub fn with_selectivity_clamp(mut self, clamp: f64) -> Self {
        self.clamp = clamp;
        self
    }
}

/// Slack for the f32 rounding of stored unit-sphere coordinates
const POINT_TOLERANCE: f64 = 4.0 * f32::EPSILON as f64;

/// Target point and chord bound of one query
#[derive(Debug, Clone, Copy)]
struct Circle {
    target: [f64; 3],
    max_chord: f64,
}

impl Circle {
    fn new(lat: f64, lon: f64, radius: f64, unit: GeoUnit) -> Self {
        let angle = (radius / unit.earth_radius()).min(std::f64::consts::PI);
        Self {
            target: to_unit_sphere(lat, lon),
            max_chord: 2.0 * (angle / 2.0).sin() + POINT_TOLERANCE,
        }
    }

    #[inline]
    fn contains(&self, point: Option<[f32; 3]>) -> bool {
        let Some(p) = point else {
            return false;
        };
        let d = [
            p[0] as f64 - self.target[0],
            p[1] as f64 - self.target[1],
            p[2] as f64 - self.target[2],
        ];
        d.iter().all(|c| c.abs() <= self.max_chord)
            && d[0] * d[0] + d[1] * d[1] + d[2] * d[2] <= self.max_chord * self.max_chord
    }
}

struct GeoDocIdSet {
    data: Arc<GeoFacetData>,
    circle: Circle,
}

impl DocIdSet for GeoDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        let data = self.data.as_ref();
        let circle = self.circle;
        let max_id = data.max_doc() as DocId - 1;
        Box::new(FindIterator::new(0, max_id, move |from, max| {
            (from..=max)
                .find(|&doc| circle.contains(data.point(doc)))
                .unwrap_or(NO_MORE_DOCS)
        }))
    }
}

impl RandomAccessDocIdSet for GeoDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        in_segment(doc, self.data.max_doc()) && self.circle.contains(self.data.point(doc))
    }
}

impl RandomAccessFilter for GeoFacetFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        let data = self.source.facet_data(segment)?;
        Ok(Box::new(GeoDocIdSet {
            data,
            circle: Circle::new(self.lat, self.lon, self.radius, self.unit),
        }))
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let Some(latitude) = &self.latitude else {
            return Ok(DEFAULT_SELECTIVITY);
        };
        let lat = latitude.facet_data(segment)?;
        let dlat = latitude_degrees(self.radius, self.unit);
        Ok(
            match numeric_index_range(lat.val_list(), self.lat - dlat, self.lat + dlat)? {
                Some((start, end)) => freq_selectivity(lat.as_ref(), start..=end, false, self.clamp),
                None => 0.0,
            },
        )
    }
}

// ============================================================================
// GeoSimpleFacetFilter
// ============================================================================

/// Documents inside the latitude/longitude box around a circle
pub struct GeoSimpleFacetFilter {
    lat_source: Arc<dyn FacetDataSource<FacetDataCache>>,
    lon_source: Arc<dyn FacetDataSource<FacetDataCache>>,
    lat: f64,
    lon: f64,
    radius: f64,
    unit: GeoUnit,
    clamp: f64,
}

impl GeoSimpleFacetFilter {
    /// Box around the circle of `radius` kilometers at (`lat`, `lon`)
    pub fn new(
        lat_source: Arc<dyn FacetDataSource<FacetDataCache>>,
        lon_source: Arc<dyn FacetDataSource<FacetDataCache>>,
        lat: f64,
        lon: f64,
        radius: f64,
    ) -> Self {
        Self {
            lat_source,
            lon_source,
            lat,
            lon,
            radius,
            unit: GeoUnit::Km,
            clamp: DEFAULT_SELECTIVITY_CLAMP,
        }
    }

    /// Filter from a `<lat, lon, radius>` range string
    pub fn from_range(
        lat_source: Arc<dyn FacetDataSource<FacetDataCache>>,
        lon_source: Arc<dyn FacetDataSource<FacetDataCache>>,
        range: &str,
    ) -> FacetResult<Self> {
        let (lat, lon, radius) = parse_geo_range(range)?;
        Ok(Self::new(lat_source, lon_source, lat, lon, radius))
    }

    /// Interpret the radius in `unit`
    pub fn with_unit(mut self, unit: GeoUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Override the selectivity clamp
    pub fn with_selectivity_clamp(mut self, clamp: f64) -> Self {
        self.clamp = clamp;
        self
    }

    /// Degree bounds `(lat_lo, lat_hi, lon_lo, lon_hi)` of the box
    fn degree_box(&self) -> (f64, f64, f64, f64) {
        let dlat = latitude_degrees(self.radius, self.unit);
        let cos_lat = self.lat.to_radians().cos();
        let dlon = if cos_lat > f64::EPSILON {
            (dlat / cos_lat).min(180.0)
        } else {
            180.0
        };
        (self.lat - dlat, self.lat + dlat, self.lon - dlon, self.lon + dlon)
    }

    /// Index ranges of the box in both caches, `None` if either is empty
    fn index_ranges(
        &self,
        lat: &FacetDataCache,
        lon: &FacetDataCache,
    ) -> FacetResult<Option<((usize, usize), (usize, usize))>> {
        let (lat_lo, lat_hi, lon_lo, lon_hi) = self.degree_box();
        let lat_range = numeric_index_range(lat.val_list(), lat_lo, lat_hi)?;
        let lon_range = numeric_index_range(lon.val_list(), lon_lo, lon_hi)?;
        Ok(lat_range.zip(lon_range))
    }
}

/// Inclusive value-index range of the numeric values within `[lo, hi]`
fn numeric_index_range(list: &dyn TermValueList, lo: f64, hi: f64) -> FacetResult<Option<(usize, usize)>> {
    if !list.kind().is_numeric() {
        return Err(FacetError::InvalidValue {
            value: format!("{}..{}", lo, hi),
            kind: list.kind().to_string(),
            reason: "geo box needs numeric coordinates".to_string(),
        });
    }
    let len = list.len();
    let first_not = |pred: &dyn Fn(f64) -> bool| {
        let (mut low, mut high) = (1, len);
        while low < high {
            let mid = low + (high - low) / 2;
            if list.raw_f64(mid).map_or(false, pred) {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low
    };
    let start = first_not(&|v| v < lo);
    let end = first_not(&|v| v <= hi) - 1;
    Ok((start <= end).then_some((start, end)))
}

struct GeoSimpleDocIdSet {
    lat: Arc<FacetDataCache>,
    lon: Arc<FacetDataCache>,
    lat_range: (i32, i32),
    lon_range: (i32, i32),
    min_id: DocId,
    max_id: DocId,
}

impl GeoSimpleDocIdSet {
    #[inline]
    fn lon_matches(lon: &FacetDataCache, range: (i32, i32), doc: DocId) -> bool {
        let index = lon.value_index(doc);
        index >= range.0 && index <= range.1
    }
}

impl DocIdSet for GeoSimpleDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        let (lat, lon) = (self.lat.as_ref(), self.lon.as_ref());
        let (lat_range, lon_range) = (self.lat_range, self.lon_range);
        Box::new(FindIterator::new(self.min_id, self.max_id, move |mut from, max| loop {
            let doc = lat
                .order_array()
                .find_value_range(lat_range.0, lat_range.1, from, max);
            if doc == NO_MORE_DOCS || Self::lon_matches(lon, lon_range, doc) {
                return doc;
            }
            if doc >= max {
                return NO_MORE_DOCS;
            }
            from = doc + 1;
        }))
    }
}

impl RandomAccessDocIdSet for GeoSimpleDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        if !in_segment(doc, self.lat.max_doc()) || !in_segment(doc, self.lon.max_doc()) {
            return false;
        }
        let index = self.lat.value_index(doc);
        index >= self.lat_range.0
            && index <= self.lat_range.1
            && Self::lon_matches(&self.lon, self.lon_range, doc)
    }
}

impl RandomAccessFilter for GeoSimpleFacetFilter {
    fn random_access_doc_id_set(
        &self,
        segment: &FacetSegment,
    ) -> FacetResult<Box<dyn RandomAccessDocIdSet>> {
        let lat = self.lat_source.facet_data(segment)?;
        let lon = self.lon_source.facet_data(segment)?;
        Ok(match self.index_ranges(&lat, &lon)? {
            Some((lat_range, lon_range)) => {
                let (min_id, max_id) = doc_bounds(lat.as_ref(), lat_range.0..=lat_range.1);
                Box::new(GeoSimpleDocIdSet {
                    lat,
                    lon,
                    lat_range: (lat_range.0 as i32, lat_range.1 as i32),
                    lon_range: (lon_range.0 as i32, lon_range.1 as i32),
                    min_id,
                    max_id,
                })
            }
            None => Box::new(EmptyDocIdSet),
        })
    }

    fn selectivity(&self, segment: &FacetSegment) -> FacetResult<f64> {
        let lat = self.lat_source.facet_data(segment)?;
        let lon = self.lon_source.facet_data(segment)?;
        Ok(match self.index_ranges(&lat, &lon)? {
            // The latitude band bounds the box from above
            Some(((start, end), _)) => freq_selectivity(lat.as_ref(), start..=end, false, self.clamp),
            None => 0.0,
        })
    }
}
