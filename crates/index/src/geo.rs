//! Precomputed unit-sphere coordinates for geo facets
//!
//! Each document's latitude/longitude (degrees) is converted once to a point
//! on the unit sphere. A distance test then reduces to a dot product against
//! the query point. Documents without both coordinates hold `MISSING_COORD`
//! and are reported by `point` as `None`.

use crate::cache::{next_cache_id, FacetDataCache};
use facets_core::{DocId, FacetResult};
use facets_storage::BigFloatArray;
use std::fmt;
use tracing::info;

/// Coordinate stored for documents without a location
pub const MISSING_COORD: f32 = f32::MAX;

/// Unit-sphere point of a latitude/longitude pair in degrees
pub fn to_unit_sphere(lat: f64, lon: f64) -> [f64; 3] {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Geo facet data of one segment
pub struct GeoFacetData {
    cache_id: u64,
    x: BigFloatArray,
    y: BigFloatArray,
    z: BigFloatArray,
    max_doc: usize,
}

impl GeoFacetData {
    /// Build from numeric latitude and longitude caches of the same segment
    pub fn from_lat_lon(lat: &FacetDataCache, lon: &FacetDataCache, max_doc: usize) -> FacetResult<Self> {
        let mut x = BigFloatArray::new(max_doc);
        let mut y = BigFloatArray::new(max_doc);
        let mut z = BigFloatArray::new(max_doc);
        x.fill(MISSING_COORD);
        y.fill(MISSING_COORD);
        z.fill(MISSING_COORD);

        let mut located = 0usize;
        for doc in 0..max_doc as DocId {
            if let (Some(la), Some(lo)) = (lat.raw_value(doc), lon.raw_value(doc)) {
                let [px, py, pz] = to_unit_sphere(la, lo);
                x.add(doc, px as f32);
                y.add(doc, py as f32);
                z.add(doc, pz as f32);
                located += 1;
            }
        }

        info!(target: "strata::facets", located, docs = max_doc, "Built geo facet data");

        Ok(Self {
            cache_id: next_cache_id(),
            x,
            y,
            z,
            max_doc,
        })
    }

    /// Unit-sphere point of `doc`, `None` if it has no location
    #[inline]
    pub fn point(&self, doc: DocId) -> Option<[f32; 3]> {
        let x = self.x.get(doc);
        if x == MISSING_COORD {
            None
        } else {
            Some([x, self.y.get(doc), self.z.get(doc)])
        }
    }

    /// Documents in the segment
    pub fn max_doc(&self) -> usize {
        self.max_doc
    }

    /// Identity of this build
    pub fn cache_id(&self) -> u64 {
        self.cache_id
    }
}

impl fmt::Debug for GeoFacetData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoFacetData")
            .field("cache_id", &self.cache_id)
            .field("max_doc", &self.max_doc)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{FacetSegment, MemorySegment};
    use facets_core::ValueKind;
    use std::sync::Arc;

    #[test]
    fn test_unit_sphere() {
        let [x, y, z] = to_unit_sphere(0.0, 0.0);
        assert!((x - 1.0).abs() < 1e-12 && y.abs() < 1e-12 && z.abs() < 1e-12);
        let [x, y, z] = to_unit_sphere(90.0, 45.0);
        assert!(x.abs() < 1e-12 && y.abs() < 1e-12 && (z - 1.0).abs() < 1e-12);
        let [x, y, z] = to_unit_sphere(37.5, -122.2);
        assert!(((x * x + y * y + z * z) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_location() {
        let mut seg = MemorySegment::new(0, 3);
        seg.add(0, "lat", "37.5").add(0, "lon", "-122.2").add(1, "lat", "10");
        let segment = FacetSegment::new(Arc::new(seg));
        let lat = segment
            .get_or_load("lat", "single-valued", |ctx| FacetDataCache::load(ctx, "lat", ValueKind::Double))
            .unwrap();
        let lon = segment
            .get_or_load("lon", "single-valued", |ctx| FacetDataCache::load(ctx, "lon", ValueKind::Double))
            .unwrap();
        let geo = GeoFacetData::from_lat_lon(&lat, &lon, 3).unwrap();
        assert!(geo.point(0).is_some());
        assert!(geo.point(1).is_none());
        assert!(geo.point(2).is_none());
    }
}
