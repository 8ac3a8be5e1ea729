//! Facet handlers
//!
//! A handler is the browse-time face of one facet. It knows where the
//! facet's data comes from, turns a `BrowseSelection` into a filter, creates
//! count collectors, and defines the facet's value order.
//!
//! Selections compose the same way for every handler: the selected values
//! are OR-ed (or AND-ed with `ValueOperation::And`), and the excluded values
//! are removed with a NOT over their OR. Excluding values keeps documents
//! that have no value at all.

use crate::collector::{
    CompactFacetCountCollector, DefaultFacetCountCollector, FacetCountCollector,
    FilterFacetCountCollector, MultiValueFacetCountCollector, RangeFacetCountCollector,
};
use crate::spec::{BrowseSelection, ValueOperation};
use facets_core::{FacetConfig, FacetResult, GeoUnit, ValueKind};
use facets_filter::{
    parse_geo_range, parse_range, AdaptiveFacetFilter, CompactMultiValueFacetFilter, FacetFilter,
    FacetOrFilter, FacetRangeFilter, GeoFacetFilter, GeoSimpleFacetFilter, MultiValueFacetFilter,
    MultiValueOrFacetFilter, RandomAccessAndFilter, RandomAccessFilter, RandomAccessNotFilter,
    RandomAccessOrFilter, RangeSpec,
};
use facets_index::{
    CompactSource, FacetDataCache, FacetDataSource, FacetSegment, GeoFacetData, GeoSource,
    MultiValueFacetDataCache, MultiValueSource, SingleValueSource, ValueStats, ValueStatsSource,
};
use facets_storage::compare_values;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::sync::Arc;

/// Browse-time behaviour of one facet
pub trait FacetHandler: Send + Sync {
    /// Facet name selections and specs refer to
    fn name(&self) -> &str;

    /// Natural order of two values of this facet
    fn compare_values(&self, a: &str, b: &str) -> Ordering;

    /// Filter for `selection`, `None` if it restricts nothing
    fn selection_filter(
        &self,
        selection: &BrowseSelection,
    ) -> FacetResult<Option<Arc<dyn RandomAccessFilter>>>;

    /// Fresh count collector for `segment`
    fn collector(&self, segment: &FacetSegment) -> FacetResult<Box<dyn FacetCountCollector>>;

    /// Build the facet's data for `segment` ahead of the first query
    fn warm(&self, segment: &FacetSegment) -> FacetResult<()>;
}

/// OR/AND the selected values and NOT the excluded ones
fn compose_selection(
    selection: &BrowseSelection,
    clamp: f64,
    any_of: impl Fn(&[String]) -> FacetResult<Arc<dyn RandomAccessFilter>>,
) -> FacetResult<Option<Arc<dyn RandomAccessFilter>>> {
    let mut parts = Vec::with_capacity(2);
    let values = selection.values();
    if !values.is_empty() {
        match selection.operation() {
            ValueOperation::Or => parts.push(any_of(values)?),
            ValueOperation::And => {
                let each = values
                    .iter()
                    .map(|v| any_of(std::slice::from_ref(v)))
                    .collect::<FacetResult<Vec<_>>>()?;
                parts.push(RandomAccessAndFilter::combine(each));
            }
        }
    }
    if !selection.not_values().is_empty() {
        let excluded = any_of(selection.not_values())?;
        parts.push(Arc::new(
            RandomAccessNotFilter::new(excluded).with_selectivity_clamp(clamp),
        ));
    }
    Ok((!parts.is_empty()).then(|| RandomAccessAndFilter::combine(parts)))
}

/// Order of predefined entries: definition order, unknown labels last
fn predefined_order(entries: &[String], a: &str, b: &str) -> Ordering {
    let position = |v: &str| entries.iter().position(|e| e == v).unwrap_or(usize::MAX);
    position(a).cmp(&position(b)).then_with(|| a.cmp(b))
}

// ============================================================================
// Value handlers
// ============================================================================

/// Single-valued facet
pub struct SimpleFacetHandler {
    source: Arc<SingleValueSource>,
    config: FacetConfig,
}

impl SimpleFacetHandler {
    /// Facet `name` over `field` holding `kind` values
    pub fn new(name: impl Into<String>, field: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            source: Arc::new(SingleValueSource::new(name, field, kind)),
            config: FacetConfig::default(),
        }
    }

    /// Builder: tune filters from `config`
    pub fn with_config(mut self, config: &FacetConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Data source of the facet
    pub fn source(&self) -> &SingleValueSource {
        &self.source
    }

    fn any_of(&self, values: &[String]) -> Arc<dyn RandomAccessFilter> {
        let data: Arc<dyn FacetDataSource<FacetDataCache>> = self.source.clone();
        let clamp = self.config.selectivity_clamp;
        let inner: Arc<dyn RandomAccessFilter> = match values {
            [value] => Arc::new(FacetFilter::new(data, value.clone()).with_selectivity_clamp(clamp)),
            _ => Arc::new(FacetOrFilter::new(data, values.to_vec(), false).with_selectivity_clamp(clamp)),
        };
        let stats: Arc<dyn ValueStatsSource> = self.source.clone();
        Arc::new(AdaptiveFacetFilter::new(stats, inner, values.to_vec(), false).with_config(&self.config))
    }
}

impl FacetHandler for SimpleFacetHandler {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn compare_values(&self, a: &str, b: &str) -> Ordering {
        compare_values(self.source.kind(), a, b)
    }

    fn selection_filter(
        &self,
        selection: &BrowseSelection,
    ) -> FacetResult<Option<Arc<dyn RandomAccessFilter>>> {
        compose_selection(selection, self.config.selectivity_clamp, |values| {
            Ok(self.any_of(values))
        })
    }

    fn collector(&self, segment: &FacetSegment) -> FacetResult<Box<dyn FacetCountCollector>> {
        let cache = self.source.facet_data(segment)?;
        Ok(Box::new(DefaultFacetCountCollector::new(cache)))
    }

    fn warm(&self, segment: &FacetSegment) -> FacetResult<()> {
        self.source.facet_data(segment).map(|_| ())
    }
}

/// Multi-valued facet backed by a nested array
pub struct MultiValueFacetHandler {
    source: Arc<MultiValueSource>,
    config: FacetConfig,
}

impl MultiValueFacetHandler {
    /// Facet `name` over `field` holding `kind` values
    pub fn new(name: impl Into<String>, field: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            source: Arc::new(MultiValueSource::new(name, field, kind)),
            config: FacetConfig::default(),
        }
    }

    /// Builder: tune filters and the per-document value limit from `config`
    pub fn with_config(mut self, config: &FacetConfig) -> Self {
        let source = MultiValueSource::clone(&self.source).with_max_items(config.max_items_per_doc);
        self.source = Arc::new(source);
        self.config = config.clone();
        self
    }

    /// Data source of the facet
    pub fn source(&self) -> &MultiValueSource {
        &self.source
    }

    fn any_of(&self, values: &[String]) -> Arc<dyn RandomAccessFilter> {
        let data: Arc<dyn FacetDataSource<MultiValueFacetDataCache>> = self.source.clone();
        let clamp = self.config.selectivity_clamp;
        let inner: Arc<dyn RandomAccessFilter> = match values {
            [value] => Arc::new(MultiValueFacetFilter::new(data, value.clone()).with_selectivity_clamp(clamp)),
            _ => Arc::new(
                MultiValueOrFacetFilter::new(data, values.to_vec(), false).with_selectivity_clamp(clamp),
            ),
        };
        let stats: Arc<dyn ValueStatsSource> = self.source.clone();
        Arc::new(AdaptiveFacetFilter::new(stats, inner, values.to_vec(), false).with_config(&self.config))
    }
}

impl FacetHandler for MultiValueFacetHandler {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn compare_values(&self, a: &str, b: &str) -> Ordering {
        compare_values(self.source.kind(), a, b)
    }

    fn selection_filter(
        &self,
        selection: &BrowseSelection,
    ) -> FacetResult<Option<Arc<dyn RandomAccessFilter>>> {
        compose_selection(selection, self.config.selectivity_clamp, |values| {
            Ok(self.any_of(values))
        })
    }

    fn collector(&self, segment: &FacetSegment) -> FacetResult<Box<dyn FacetCountCollector>> {
        let cache = self.source.facet_data(segment)?;
        Ok(Box::new(MultiValueFacetCountCollector::new(cache)))
    }

    fn warm(&self, segment: &FacetSegment) -> FacetResult<()> {
        self.source.facet_data(segment).map(|_| ())
    }
}

/// Multi-valued facet with at most 32 distinct values, stored as bit masks
pub struct CompactMultiValueFacetHandler {
    source: Arc<CompactSource>,
    clamp: f64,
}

impl CompactMultiValueFacetHandler {
    /// Facet `name` over `field` holding `kind` values
    pub fn new(name: impl Into<String>, field: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            source: Arc::new(CompactSource::new(name, field, kind)),
            clamp: FacetConfig::default().selectivity_clamp,
        }
    }

    /// Builder: tune filters from `config`
    pub fn with_config(mut self, config: &FacetConfig) -> Self {
        self.clamp = config.selectivity_clamp;
        self
    }
}

impl FacetHandler for CompactMultiValueFacetHandler {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn compare_values(&self, a: &str, b: &str) -> Ordering {
        compare_values(self.source.kind(), a, b)
    }

    fn selection_filter(
        &self,
        selection: &BrowseSelection,
    ) -> FacetResult<Option<Arc<dyn RandomAccessFilter>>> {
        compose_selection(selection, self.clamp, |values| {
            let filter = CompactMultiValueFacetFilter::new(self.source.clone(), values.to_vec(), false)
                .with_selectivity_clamp(self.clamp);
            Ok(Arc::new(filter))
        })
    }

    fn collector(&self, segment: &FacetSegment) -> FacetResult<Box<dyn FacetCountCollector>> {
        let cache = self.source.facet_data(segment)?;
        Ok(Box::new(CompactFacetCountCollector::new(cache)))
    }

    fn warm(&self, segment: &FacetSegment) -> FacetResult<()> {
        self.source.facet_data(segment).map(|_| ())
    }
}

// ============================================================================
// Predefined-entry handlers
// ============================================================================

/// Facet of predefined value ranges over a single-valued field
///
/// Entries are the range strings themselves, e.g. `[* TO 4]`, reported in
/// definition order.
pub struct RangeFacetHandler {
    name: String,
    source: Arc<SingleValueSource>,
    ranges: Vec<String>,
    clamp: f64,
}

impl RangeFacetHandler {
    /// Facet `name` bucketing `source` into `ranges`
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if a range string is malformed.
    pub fn new(name: impl Into<String>, source: SingleValueSource, ranges: Vec<String>) -> FacetResult<Self> {
        for range in &ranges {
            RangeSpec::parse(range)?;
        }
        Ok(Self {
            name: name.into(),
            source: Arc::new(source),
            ranges,
            clamp: FacetConfig::default().selectivity_clamp,
        })
    }

    /// Builder: tune filters from `config`
    pub fn with_config(mut self, config: &FacetConfig) -> Self {
        self.clamp = config.selectivity_clamp;
        self
    }

    /// Predefined ranges
    pub fn ranges(&self) -> &[String] {
        &self.ranges
    }
}

impl FacetHandler for RangeFacetHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn compare_values(&self, a: &str, b: &str) -> Ordering {
        predefined_order(&self.ranges, a, b)
    }

    fn selection_filter(
        &self,
        selection: &BrowseSelection,
    ) -> FacetResult<Option<Arc<dyn RandomAccessFilter>>> {
        compose_selection(selection, self.clamp, |values| {
            let mut filters: Vec<Arc<dyn RandomAccessFilter>> = Vec::with_capacity(values.len());
            for range in values {
                RangeSpec::parse(range)?;
                let data: Arc<dyn FacetDataSource<FacetDataCache>> = self.source.clone();
                filters.push(Arc::new(
                    FacetRangeFilter::new(data, range.clone()).with_selectivity_clamp(self.clamp),
                ));
            }
            Ok(RandomAccessOrFilter::combine(filters))
        })
    }

    fn collector(&self, segment: &FacetSegment) -> FacetResult<Box<dyn FacetCountCollector>> {
        let cache = self.source.facet_data(segment)?;
        let mut spans = Vec::with_capacity(self.ranges.len());
        for range in &self.ranges {
            spans.push((range.clone(), parse_range(cache.val_list(), range)?));
        }
        Ok(Box::new(RangeFacetCountCollector::new(cache, spans)))
    }

    fn warm(&self, segment: &FacetSegment) -> FacetResult<()> {
        self.source.facet_data(segment).map(|_| ())
    }
}

/// Facet of predefined circles over unit-sphere points
///
/// Entries are `<lat, lon, radius>` strings.
pub struct GeoFacetHandler {
    name: String,
    source: Arc<GeoSource>,
    ranges: Vec<String>,
    unit: GeoUnit,
    clamp: f64,
}

impl GeoFacetHandler {
    /// Facet `name` counting the points of `source` inside each of `ranges`
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if a range string is malformed.
    pub fn new(name: impl Into<String>, source: GeoSource, ranges: Vec<String>) -> FacetResult<Self> {
        for range in &ranges {
            parse_geo_range(range)?;
        }
        Ok(Self {
            name: name.into(),
            source: Arc::new(source),
            ranges,
            unit: GeoUnit::default(),
            clamp: FacetConfig::default().selectivity_clamp,
        })
    }

    /// Builder: take the radius unit and clamp from `config`
    pub fn with_config(mut self, config: &FacetConfig) -> Self {
        self.unit = config.geo_unit;
        self.clamp = config.selectivity_clamp;
        self
    }

    fn circle(&self, range: &str) -> FacetResult<GeoFacetFilter> {
        let data: Arc<dyn FacetDataSource<GeoFacetData>> = self.source.clone();
        let latitude: Arc<dyn FacetDataSource<FacetDataCache>> = Arc::new(self.source.lat().clone());
        Ok(GeoFacetFilter::from_range(data, range)?
            .with_unit(self.unit)
            .with_latitude(latitude)
            .with_selectivity_clamp(self.clamp))
    }
}

impl FacetHandler for GeoFacetHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn compare_values(&self, a: &str, b: &str) -> Ordering {
        predefined_order(&self.ranges, a, b)
    }

    fn selection_filter(
        &self,
        selection: &BrowseSelection,
    ) -> FacetResult<Option<Arc<dyn RandomAccessFilter>>> {
        compose_selection(selection, self.clamp, |values| {
            let filters = values
                .iter()
                .map(|range| Ok(Arc::new(self.circle(range)?) as Arc<dyn RandomAccessFilter>))
                .collect::<FacetResult<Vec<_>>>()?;
            Ok(RandomAccessOrFilter::combine(filters))
        })
    }

    fn collector(&self, segment: &FacetSegment) -> FacetResult<Box<dyn FacetCountCollector>> {
        let mut entries = Vec::with_capacity(self.ranges.len());
        for range in &self.ranges {
            let set = self.circle(range)?.random_access_doc_id_set(segment)?;
            entries.push((range.clone(), set));
        }
        Ok(Box::new(FilterFacetCountCollector::new(entries)))
    }

    fn warm(&self, segment: &FacetSegment) -> FacetResult<()> {
        self.source.facet_data(segment).map(|_| ())
    }
}

/// Facet of predefined latitude/longitude boxes over two numeric facets
pub struct GeoSimpleFacetHandler {
    name: String,
    lat: Arc<SingleValueSource>,
    lon: Arc<SingleValueSource>,
    ranges: Vec<String>,
    unit: GeoUnit,
    clamp: f64,
}

impl GeoSimpleFacetHandler {
    /// Facet `name` over latitude `lat` and longitude `lon`
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if a range string is malformed.
    pub fn new(
        name: impl Into<String>,
        lat: SingleValueSource,
        lon: SingleValueSource,
        ranges: Vec<String>,
    ) -> FacetResult<Self> {
        for range in &ranges {
            parse_geo_range(range)?;
        }
        Ok(Self {
            name: name.into(),
            lat: Arc::new(lat),
            lon: Arc::new(lon),
            ranges,
            unit: GeoUnit::default(),
            clamp: FacetConfig::default().selectivity_clamp,
        })
    }

    /// Builder: take the radius unit and clamp from `config`
    pub fn with_config(mut self, config: &FacetConfig) -> Self {
        self.unit = config.geo_unit;
        self.clamp = config.selectivity_clamp;
        self
    }

    fn rectangle(&self, range: &str) -> FacetResult<GeoSimpleFacetFilter> {
        let lat: Arc<dyn FacetDataSource<FacetDataCache>> = self.lat.clone();
        let lon: Arc<dyn FacetDataSource<FacetDataCache>> = self.lon.clone();
        Ok(GeoSimpleFacetFilter::from_range(lat, lon, range)?
            .with_unit(self.unit)
            .with_selectivity_clamp(self.clamp))
    }
}

impl FacetHandler for GeoSimpleFacetHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn compare_values(&self, a: &str, b: &str) -> Ordering {
        predefined_order(&self.ranges, a, b)
    }

    fn selection_filter(
        &self,
        selection: &BrowseSelection,
    ) -> FacetResult<Option<Arc<dyn RandomAccessFilter>>> {
        compose_selection(selection, self.clamp, |values| {
            let filters = values
                .iter()
                .map(|range| Ok(Arc::new(self.rectangle(range)?) as Arc<dyn RandomAccessFilter>))
                .collect::<FacetResult<Vec<_>>>()?;
            Ok(RandomAccessOrFilter::combine(filters))
        })
    }

    fn collector(&self, segment: &FacetSegment) -> FacetResult<Box<dyn FacetCountCollector>> {
        let mut entries = Vec::with_capacity(self.ranges.len());
        for range in &self.ranges {
            let set = self.rectangle(range)?.random_access_doc_id_set(segment)?;
            entries.push((range.clone(), set));
        }
        Ok(Box::new(FilterFacetCountCollector::new(entries)))
    }

    fn warm(&self, segment: &FacetSegment) -> FacetResult<()> {
        self.lat.facet_data(segment)?;
        self.lon.facet_data(segment).map(|_| ())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Handlers by facet name
#[derive(Default, Clone)]
pub struct FacetHandlers {
    handlers: FxHashMap<String, Arc<dyn FacetHandler>>,
}

impl FacetHandlers {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register `handler` under its name, replacing any previous one
    pub fn with(mut self, handler: impl FacetHandler + 'static) -> Self {
        self.register(Arc::new(handler));
        self
    }

    /// Register `handler` under its name, replacing any previous one
    pub fn register(&mut self, handler: Arc<dyn FacetHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    /// Handler of `facet`
    pub fn get(&self, facet: &str) -> Option<&Arc<dyn FacetHandler>> {
        self.handlers.get(facet)
    }

    /// Registered facet names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the data of every facet for `segment`
    pub fn warm(&self, segment: &FacetSegment) -> FacetResult<()> {
        for name in self.names() {
            if let Some(handler) = self.handlers.get(name) {
                handler.warm(segment)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for FacetHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacetHandlers").field("facets", &self.names()).finish()
    }
}
