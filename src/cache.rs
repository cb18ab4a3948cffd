//! Result cache.
//!
//! Memoizes ranked reports keyed by `(sort key, threshold, filters)` plus
//! the `latest` cutoff those filters compiled to.
//! With the default capacity of one this is a single-slot memo: any
//! settings change produces a new key and a recompute. Ingesting a batch
//! clears every entry, since every cached report may now be stale.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tracing::debug;

use crate::filter::FilterSpec;
use crate::query::Report;
use crate::settings::{Settings, SortKey};

/// Everything a cached report depends on.
///
/// `latest_cutoff` is the compiled `latest` window (epoch seconds), so a
/// report stops matching once the clock moves past its cutoff.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub sort_key: SortKey,
    pub threshold: u64,
    pub filters: FilterSpec,
    pub latest_cutoff: Option<i64>,
}

impl CacheKey {
    pub fn new(settings: &Settings, latest_cutoff: Option<i64>) -> Self {
        Self {
            sort_key: settings.sort_key,
            threshold: settings.threshold,
            filters: settings.filters.clone(),
            latest_cutoff,
        }
    }
}

/// Hit/miss counters for the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

pub struct ResultCache {
    entries: LruCache<CacheKey, Arc<Report>>,
    stats: CacheStats,
}

impl ResultCache {
    pub fn new(slots: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(slots),
            stats: CacheStats::default(),
        }
    }

    /// Single-slot cache.
    pub fn single() -> Self {
        Self::new(NonZeroUsize::MIN)
    }

    /// Returns the cached report for `key`, if one is still valid.
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<Report>> {
        match self.entries.get(key) {
            Some(report) => {
                self.stats.hits += 1;
                debug!("Cache hit for sort key {}", key.sort_key);
                Some(Arc::clone(report))
            }
            None => {
                self.stats.misses += 1;
                debug!("Cache miss for sort key {}", key.sort_key);
                None
            }
        }
    }

    pub fn put(&mut self, key: CacheKey, report: Arc<Report>) {
        self.entries.put(key, report);
    }

    /// Marks every cached report stale.
    pub fn invalidate(&mut self) {
        if !self.entries.is_empty() {
            debug!("Invalidating {} cached reports", self.entries.len());
        }
        self.entries.clear();
        self.stats.invalidations += 1;
    }

    /// Whether a valid entry exists for `key`. Does not touch the counters.
    pub fn is_valid(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::single()
    }
}
