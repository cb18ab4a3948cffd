//! Query entry point.
//!
//! A [`QueryContext`] owns the batch store, the settings, the result cache
//! and the clock. Every query runs the same pipeline:
//!
//! ```text
//! settings ──> cache lookup ──(miss)──> filter ──> aggregate ──> rank ──> cache store
//! ```
//!
//! Raw queries skip the cache, aggregation and ranking: they return every
//! surviving session, newest batch first, with no threshold applied.
//!
//! The context is a single-owner value. Sharing it across tasks means
//! wrapping the whole context in one lock, so that reading the settings,
//! checking the cache and storing a result happen as one step.

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::{self, LocalHostRecord, PointToPointRecord, RawRecord};
use crate::cache::{CacheKey, CacheStats, ResultCache};
use crate::error::{FilterError, IngestionError, QueryError};
use crate::filter::{FilterName, Filters};
use crate::model::FlowBatch;
use crate::rank;
use crate::settings::{Settings, SortKey, View};
use crate::store::BatchStore;

/// Source of "now" for the `latest` filter.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant, for replaying old captures.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The ranked rows of one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Report {
    Raw(Vec<RawRecord>),
    PointToPoint(Vec<PointToPointRecord>),
    LocalHost(Vec<LocalHostRecord>),
}

impl Report {
    pub fn view(&self) -> View {
        match self {
            Self::Raw(_) => View::Raw,
            Self::PointToPoint(_) => View::PointToPoint,
            Self::LocalHost(_) => View::LocalHost,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Raw(rows) => rows.len(),
            Self::PointToPoint(rows) => rows.len(),
            Self::LocalHost(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runtime statistics for a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryStats {
    pub batches: usize,
    pub sessions: usize,
    pub cache: CacheStats,
    /// Number of times the filter/aggregate/rank pipeline actually ran.
    pub computations: u64,
}

pub struct QueryContext {
    store: BatchStore,
    settings: Settings,
    cache: ResultCache,
    clock: Box<dyn Clock>,
    warnings: Vec<FilterError>,
    computations: u64,
}

impl QueryContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            store: BatchStore::new(),
            settings,
            cache: ResultCache::single(),
            clock: Box::new(SystemClock),
            warnings: Vec::new(),
            computations: 0,
        }
    }

    pub fn with_cache_slots(mut self, slots: NonZeroUsize) -> Self {
        self.cache = ResultCache::new(slots);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Appends a batch and invalidates every cached report.
    pub fn ingest(&mut self, batch: FlowBatch) -> Result<(), IngestionError> {
        self.store.ingest(batch)?;
        self.cache.invalidate();
        Ok(())
    }

    /// Reads a batch file, appends it, and invalidates every cached report.
    pub fn ingest_file(&mut self, path: &Path) -> Result<(), IngestionError> {
        self.store.ingest_file(path)?;
        self.cache.invalidate();
        Ok(())
    }

    pub fn store(&self) -> &BatchStore {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Settings changes take effect on the next query; a changed cache key
    /// forces a recompute.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn set_sort_key(&mut self, key: &str) -> Result<(), QueryError> {
        self.settings.sort_key = key.parse()?;
        Ok(())
    }

    pub fn set_threshold(&mut self, threshold: u64) {
        self.settings.threshold = threshold;
    }

    pub fn set_filter(&mut self, name: &str, value: &str) -> Result<(), QueryError> {
        let name: FilterName = name.parse()?;
        self.settings.filters.set(name, value);
        Ok(())
    }

    pub fn clear_filter(&mut self, name: &str) -> Result<Option<String>, QueryError> {
        let name: FilterName = name.parse()?;
        Ok(self.settings.filters.remove(name))
    }

    /// Filter-format problems found while compiling the current filters.
    pub fn warnings(&self) -> &[FilterError] {
        &self.warnings
    }

    pub fn stats(&self) -> QueryStats {
        QueryStats {
            batches: self.store.len(),
            sessions: self.store.session_count(),
            cache: self.cache.stats(),
            computations: self.computations,
        }
    }

    /// Runs the current settings. With `raw` set, or with the `raw` sort
    /// key, returns the flattened session rows instead of a ranked view.
    pub fn query(&mut self, raw: bool) -> Result<Arc<Report>, QueryError> {
        let (filters, warnings) = Filters::compile(&self.settings.filters, self.clock.now());
        self.warnings = warnings;

        let view = if raw { View::Raw } else { self.settings.sort_key.view() };
        if view == View::Raw {
            return Ok(Arc::new(self.compute(&filters, View::Raw)?));
        }

        let key = CacheKey::new(&self.settings, filters.latest_cutoff());
        if let Some(report) = self.cache.get(&key) {
            return Ok(report);
        }

        let report = Arc::new(self.compute(&filters, view)?);
        self.cache.put(key, Arc::clone(&report));
        Ok(report)
    }

    fn compute(&mut self, filters: &Filters, view: View) -> Result<Report, QueryError> {
        self.computations += 1;
        let key = self.settings.sort_key;
        let threshold = self.settings.threshold;
        let filtered = filters.apply(self.store.batches());

        let report = match view {
            View::Raw => {
                let mut rows = aggregate::raw_view(&filtered);
                rank::sort_raw(&mut rows);
                Report::Raw(rows)
            }
            View::PointToPoint => {
                let peers = aggregate::point_to_point(&filtered);
                Report::PointToPoint(rank::rank(peers, key, threshold)?)
            }
            View::LocalHost => {
                let hosts = aggregate::local_hosts(&aggregate::point_to_point(&filtered));
                Report::LocalHost(rank::rank(hosts, key, threshold)?)
            }
        };

        debug!(
            "Computed {} view over {} batches: {} rows",
            view,
            filtered.len(),
            report.len()
        );
        if key != SortKey::Raw && view != View::Raw {
            info!("Ranked {} rows by {} (threshold {})", report.len(), key, threshold);
        }
        Ok(report)
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
