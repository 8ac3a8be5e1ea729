//! Named loaders binding a facet to its field and cache flavour
//!
//! Handlers and filters never build caches themselves: they hold a source
//! and ask it for the segment's data, which is built on first use and then
//! shared by every query against that segment.

use crate::cache::{FacetDataCache, ValueStats};
use crate::compact::CompactFacetDataCache;
use crate::geo::GeoFacetData;
use crate::multi::MultiValueFacetDataCache;
use crate::segment::FacetSegment;
use facets_core::{FacetResult, ValueKind, DEFAULT_MAX_ITEMS};
use std::borrow::Cow;
use std::sync::Arc;

/// Provides data of type `D` for a named facet
pub trait FacetDataSource<D>: Send + Sync {
    /// Facet name the data is registered under
    fn name(&self) -> &str;

    /// Data of this facet for `segment`, built on first access
    fn facet_data(&self, segment: &FacetSegment) -> FacetResult<Arc<D>>;
}

/// Provides per-value statistics of a field-backed facet
pub trait ValueStatsSource: Send + Sync {
    /// Facet name
    fn name(&self) -> &str;

    /// Index field the facet is built from
    fn field(&self) -> &str;

    /// Statistics for `segment`
    fn value_stats(&self, segment: &FacetSegment) -> FacetResult<Arc<dyn ValueStats>>;
}

macro_rules! field_source {
    ($(#[$meta:meta])* $name:ident, $data:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            name: String,
            field: String,
            kind: ValueKind,
        }

        impl $name {
            /// Source reading `field` as `kind` values under facet `name`
            pub fn new(name: impl Into<String>, field: impl Into<String>, kind: ValueKind) -> Self {
                Self {
                    name: name.into(),
                    field: field.into(),
                    kind,
                }
            }

            /// Facet name
            pub fn name(&self) -> &str {
                &self.name
            }

            /// Index field
            pub fn field(&self) -> &str {
                &self.field
            }

            /// Value type of the field
            pub fn kind(&self) -> ValueKind {
                self.kind
            }
        }

        impl ValueStatsSource for $name {
            fn name(&self) -> &str {
                &self.name
            }

            fn field(&self) -> &str {
                &self.field
            }

            fn value_stats(&self, segment: &FacetSegment) -> FacetResult<Arc<dyn ValueStats>> {
                let data: Arc<$data> = self.facet_data(segment)?;
                Ok(data)
            }
        }
    };
}

field_source!(
    /// Single-valued field source
    SingleValueSource,
    FacetDataCache
);

field_source!(
    /// Compact multi-valued field source
    CompactSource,
    CompactFacetDataCache
);

impl FacetDataSource<FacetDataCache> for SingleValueSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn facet_data(&self, segment: &FacetSegment) -> FacetResult<Arc<FacetDataCache>> {
        segment.get_or_load(&self.name, "single-valued", |ctx| {
            FacetDataCache::load(ctx, &self.field, self.kind)
        })
    }
}

impl FacetDataSource<CompactFacetDataCache> for CompactSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn facet_data(&self, segment: &FacetSegment) -> FacetResult<Arc<CompactFacetDataCache>> {
        segment.get_or_load(&self.name, "compact multi-valued", |ctx| {
            CompactFacetDataCache::load(ctx, &self.field, self.kind)
        })
    }
}

/// Multi-valued field source
///
/// Data built with a non-default `max_items` is registered under
/// `name#max_items=N`, so sources sharing a name but not a limit never share
/// a build.
#[derive(Debug, Clone)]
pub struct MultiValueSource {
    name: String,
    field: String,
    kind: ValueKind,
    max_items: usize,
}

impl MultiValueSource {
    /// Source reading `field` as `kind` values under facet `name`
    pub fn new(name: impl Into<String>, field: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            kind,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    /// Override the per-document value limit
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Facet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index field
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Value type of the field
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Key the segment stores this source's data under
    pub fn cache_key(&self) -> Cow<'_, str> {
        if self.max_items == DEFAULT_MAX_ITEMS {
            Cow::Borrowed(&self.name)
        } else {
            Cow::Owned(format!("{}#max_items={}", self.name, self.max_items))
        }
    }
}

impl FacetDataSource<MultiValueFacetDataCache> for MultiValueSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn facet_data(&self, segment: &FacetSegment) -> FacetResult<Arc<MultiValueFacetDataCache>> {
        segment.get_or_load(&self.cache_key(), "multi-valued", |ctx| {
            MultiValueFacetDataCache::load(ctx, &self.field, self.kind, self.max_items)
        })
    }
}

impl ValueStatsSource for MultiValueSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn field(&self) -> &str {
        &self.field
    }

    fn value_stats(&self, segment: &FacetSegment) -> FacetResult<Arc<dyn ValueStats>> {
        let data: Arc<MultiValueFacetDataCache> = self.facet_data(segment)?;
        Ok(data)
    }
}

/// Geo source combining latitude and longitude facets
#[derive(Debug, Clone)]
pub struct GeoSource {
    name: String,
    lat: SingleValueSource,
    lon: SingleValueSource,
}

impl GeoSource {
    /// Geo facet `name` over the given latitude and longitude sources
    pub fn new(name: impl Into<String>, lat: SingleValueSource, lon: SingleValueSource) -> Self {
        Self {
            name: name.into(),
            lat,
            lon,
        }
    }

    /// Latitude source
    pub fn lat(&self) -> &SingleValueSource {
        &self.lat
    }

    /// Longitude source
    pub fn lon(&self) -> &SingleValueSource {
        &self.lon
    }
}

impl FacetDataSource<GeoFacetData> for GeoSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn facet_data(&self, segment: &FacetSegment) -> FacetResult<Arc<GeoFacetData>> {
        // Coordinates first: the geo build must not re-enter the segment
        let lat = self.lat.facet_data(segment)?;
        let lon = self.lon.facet_data(segment)?;
        segment.get_or_load(&self.name, "geo", |ctx| {
            ctx.check_cancelled()?;
            GeoFacetData::from_lat_lon(&lat, &lon, ctx.reader().max_doc())
        })
    }
}
