//! Value-index bitset cached per facet data build
//!
//! An OR filter resolves its values to a bitset once and reuses it for every
//! query against the same cache. The entry is keyed by the cache's
//! `cache_id`, so a reopened segment (new cache) always rebuilds.

use facets_storage::OpenBitSet;
use parking_lot::RwLock;
use std::sync::Arc;

/// Single-entry bitset cache keyed by facet data identity
#[derive(Debug, Default)]
pub struct BitSetCache {
    entry: RwLock<Option<(u64, Arc<OpenBitSet>)>>,
}

impl BitSetCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Bitset for `cache_id`, built with `build` on a miss
    pub fn get_or_build(&self, cache_id: u64, build: impl FnOnce() -> OpenBitSet) -> Arc<OpenBitSet> {
        if let Some((id, bits)) = self.entry.read().as_ref() {
            if *id == cache_id {
                return bits.clone();
            }
        }

        let mut entry = self.entry.write();
        if let Some((id, bits)) = entry.as_ref() {
            if *id == cache_id {
                return bits.clone();
            }
        }
        let bits = Arc::new(build());
        *entry = Some((cache_id, bits.clone()));
        bits
    }

    /// Identity of the cached build, if any
    pub fn cached_id(&self) -> Option<u64> {
        self.entry.read().as_ref().map(|(id, _)| *id)
    }
}
