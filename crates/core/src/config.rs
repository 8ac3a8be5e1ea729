//! Faceting configuration via `facets.toml`
//!
//! Holds the tuning knobs of the filter and browse layers. The selectivity
//! clamp and the adaptive thresholds are heuristics, so they live here
//! rather than as constants in the filters.

use crate::error::{FacetError, FacetResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "facets.toml";

/// Default maximum number of values a document may hold in a multi-valued field
pub const DEFAULT_MAX_ITEMS: usize = 1024;

/// Largest per-document value count the nested slot encoding can express
pub const MAX_ITEMS_LIMIT: usize = 2047;

/// Default selectivity above which an estimate snaps to 1.0
pub const DEFAULT_SELECTIVITY_CLAMP: f64 = 0.999;

/// Default number of terms below which postings are OR-ed term by term
pub const DEFAULT_OR_THRESHOLD: usize = 5;

/// Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Earth radius in miles
pub const EARTH_RADIUS_MILES: f64 = 3956.0;

/// Snap a selectivity estimate into `[0, 1]`
///
/// NaN and non-positive estimates become 0.0, estimates above `clamp` 1.0.
pub fn clamp_selectivity(selectivity: f64, clamp: f64) -> f64 {
    if selectivity.is_nan() || selectivity <= 0.0 {
        0.0
    } else if selectivity > clamp {
        1.0
    } else {
        selectivity
    }
}

/// Distance unit of geo radii
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeoUnit {
    /// Kilometers
    #[default]
    Km,
    /// Miles
    Miles,
}

impl GeoUnit {
    /// Earth radius expressed in this unit
    pub fn earth_radius(&self) -> f64 {
        match self {
            GeoUnit::Km => EARTH_RADIUS_KM,
            GeoUnit::Miles => EARTH_RADIUS_MILES,
        }
    }
}

/// Faceting configuration loaded from `facets.toml`.
///
/// # Example
///
/// ```toml
/// max_items_per_doc = 1024
/// selectivity_clamp = 0.999
/// or_threshold = 5
/// adaptive_posting_ratio = 0.5
/// prefilter_max_selectivity = 0.25
/// geo_unit = "km"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetConfig {
    /// Maximum values per document in multi-valued fields.
    #[serde(default = "default_max_items")]
    pub max_items_per_doc: usize,
    /// Selectivities above this value are reported as 1.0.
    #[serde(default = "default_selectivity_clamp")]
    pub selectivity_clamp: f64,
    /// Below this many selected terms, the adaptive filter unions postings.
    #[serde(default = "default_or_threshold")]
    pub or_threshold: usize,
    /// Posting unions are used when matching docs < ratio * max_doc.
    #[serde(default = "default_adaptive_posting_ratio")]
    pub adaptive_posting_ratio: f64,
    /// Selections at or below this selectivity drive iteration during browse.
    #[serde(default = "default_prefilter_max_selectivity")]
    pub prefilter_max_selectivity: f64,
    /// Unit of geo radii.
    #[serde(default)]
    pub geo_unit: GeoUnit,
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

fn default_selectivity_clamp() -> f64 {
    DEFAULT_SELECTIVITY_CLAMP
}

fn default_or_threshold() -> usize {
    DEFAULT_OR_THRESHOLD
}

fn default_adaptive_posting_ratio() -> f64 {
    0.5
}

fn default_prefilter_max_selectivity() -> f64 {
    0.25
}

impl Default for FacetConfig {
    fn default() -> Self {
        Self {
            max_items_per_doc: default_max_items(),
            selectivity_clamp: default_selectivity_clamp(),
            or_threshold: default_or_threshold(),
            adaptive_posting_ratio: default_adaptive_posting_ratio(),
            prefilter_max_selectivity: default_prefilter_max_selectivity(),
            geo_unit: GeoUnit::default(),
        }
    }
}

impl FacetConfig {
    /// Check every field is within its supported range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> FacetResult<()> {
        if self.max_items_per_doc == 0 || self.max_items_per_doc > MAX_ITEMS_LIMIT {
            return Err(FacetError::InvalidConfig(format!(
                "max_items_per_doc must be in 1..={}, got {}",
                MAX_ITEMS_LIMIT, self.max_items_per_doc
            )));
        }
        if !(0.0..=1.0).contains(&self.selectivity_clamp) {
            return Err(FacetError::InvalidConfig(format!(
                "selectivity_clamp must be in [0, 1], got {}",
                self.selectivity_clamp
            )));
        }
        if self.or_threshold == 0 {
            return Err(FacetError::InvalidConfig(
                "or_threshold must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.adaptive_posting_ratio) {
            return Err(FacetError::InvalidConfig(format!(
                "adaptive_posting_ratio must be in [0, 1], got {}",
                self.adaptive_posting_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.prefilter_max_selectivity) {
            return Err(FacetError::InvalidConfig(format!(
                "prefilter_max_selectivity must be in [0, 1], got {}",
                self.prefilter_max_selectivity
            )));
        }
        Ok(())
    }

    /// Snap an estimate into `[0, 1]`, reporting values above the clamp as 1.0.
    pub fn clamp_selectivity(&self, selectivity: f64) -> f64 {
        clamp_selectivity(selectivity, self.selectivity_clamp)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Faceting configuration
#
# Maximum number of values per document in multi-valued fields (1..=2047).
max_items_per_doc = 1024

# Selectivity estimates above this value are reported as 1.0.
selectivity_clamp = 0.999

# Adaptive OR filters union term postings when fewer than this many
# values are selected.
or_threshold = 5

# Posting unions are only used when the selected values cover fewer
# than this fraction of the segment.
adaptive_posting_ratio = 0.5

# Selections at or below this selectivity drive document iteration;
# the rest are verified with random access.
prefilter_max_selectivity = 0.25

# Unit of geo radii: "km" or "miles".
geo_unit = "km"
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> FacetResult<Self> {
        let config: FacetConfig = toml::from_str(content)
            .map_err(|e| FacetError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> FacetResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            FacetError::InvalidConfig(msg) => {
                FacetError::InvalidConfig(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> FacetResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> FacetResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FacetError::InvalidConfig(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
