//! Subpart cache for one top-level build.
//!
//! Keys ignore color: fragments are cached with code-16 polygons still
//! unpainted and painted per reference site after retrieval.

use std::collections::HashMap;

use crate::fragment::{GeometryFragment, Provenance};
use crate::winding::Winding;

/// Identity of a built subpart.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Normalized, lowercased reference
    pub reference: String,
    pub winding: Winding,
    pub provenance: Provenance,
}

impl CacheKey {
    pub fn new(reference: &str, winding: Winding, provenance: Provenance) -> Self {
        Self {
            reference: reference.to_lowercase(),
            winding,
            provenance,
        }
    }
}

/// Hit/miss counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Caller-owned memoization of built subparts.
///
/// Valid for a single build configuration only; call [`SubpartCache::clear`]
/// between differently configured passes.
#[derive(Clone, Debug, Default)]
pub struct SubpartCache {
    entries: HashMap<CacheKey, GeometryFragment>,
    stats: CacheStats,
}

impl SubpartCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a fragment, counting the hit or miss.
    pub fn get(&mut self, key: &CacheKey) -> Option<&GeometryFragment> {
        let found = self.entries.get(key);
        if found.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        found
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: CacheKey, fragment: GeometryFragment) {
        self.entries.insert(key, fragment);
    }

    pub fn clear(&mut self) {
        log::debug!(
            "Clearing subpart cache ({} entries, {} hits, {} misses)",
            self.entries.len(),
            self.stats.hits,
            self.stats.misses
        );
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
