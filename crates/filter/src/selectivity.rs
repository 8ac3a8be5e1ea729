//! Selectivity estimates and scan bounds from per-value statistics

use facets_core::{clamp_selectivity, DocId, NO_MORE_DOCS};
use facets_index::ValueStats;

/// Total document frequency of `indices`
pub fn freq_sum(stats: &dyn ValueStats, indices: impl IntoIterator<Item = usize>) -> i64 {
    let freqs = stats.freqs();
    indices
        .into_iter()
        .filter_map(|i| freqs.get(i))
        .map(|&f| f as i64)
        .sum()
}

/// Fraction of the segment holding one of `indices`
///
/// With `complement` set the estimate covers the documents holding some
/// other value: documents without a value (index 0) match neither side.
/// Segments without documents have selectivity 0.
pub fn freq_selectivity(
    stats: &dyn ValueStats,
    indices: impl IntoIterator<Item = usize>,
    complement: bool,
    clamp: f64,
) -> f64 {
    let max_doc = stats.max_doc();
    if max_doc == 0 {
        return 0.0;
    }
    let fraction = if complement {
        let missing = stats.freqs().first().copied().unwrap_or(0) as i64;
        let selected = freq_sum(stats, indices.into_iter().filter(|&i| i != 0));
        (max_doc as i64 - missing - selected).max(0) as f64 / max_doc as f64
    } else {
        freq_sum(stats, indices) as f64 / max_doc as f64
    };
    clamp_selectivity(fraction, clamp)
}

/// Smallest and largest doc holding one of `indices`
///
/// Returns `(NO_MORE_DOCS, -1)` when no selected value occurs.
pub fn doc_bounds(stats: &dyn ValueStats, indices: impl IntoIterator<Item = usize>) -> (DocId, DocId) {
    let (min_ids, max_ids) = (stats.min_ids(), stats.max_ids());
    indices
        .into_iter()
        .filter(|&i| i < min_ids.len())
        .fold((NO_MORE_DOCS, -1), |(lo, hi), i| {
            (lo.min(min_ids[i]), hi.max(max_ids[i]))
        })
}
