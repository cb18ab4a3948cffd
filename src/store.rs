//! Batch store: an append-only collection of ingested flow batches.
//!
//! There is no deduplication and no eviction; callers bound how much they
//! ingest.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::IngestionError;
use crate::model::FlowBatch;

#[derive(Debug, Default)]
pub struct BatchStore {
    batches: Vec<FlowBatch>,
    sessions: usize,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and appends a batch. On error the store is unchanged.
    pub fn ingest(&mut self, batch: FlowBatch) -> Result<(), IngestionError> {
        batch.validate()?;
        self.sessions += batch.sessions.len();
        self.batches.push(batch);
        Ok(())
    }

    /// Parses a batch from its canonical JSON form and appends it.
    pub fn ingest_json(&mut self, json: &str) -> Result<(), IngestionError> {
        let batch = FlowBatch::from_json(json)?;
        self.ingest(batch)
    }

    /// Reads a batch file and appends it.
    pub fn ingest_file(&mut self, path: &Path) -> Result<(), IngestionError> {
        let json = std::fs::read_to_string(path).map_err(|source| IngestionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.ingest_json(&json)?;

        info!(
            "Ingested {} ({} sessions, {} batches total)",
            path.display(),
            self.batches.last().map_or(0, |b| b.sessions.len()),
            self.batches.len()
        );
        Ok(())
    }

    /// Batches in append order.
    pub fn batches(&self) -> &[FlowBatch] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn session_count(&self) -> usize {
        self.sessions
    }
}

/// A directory of batch files, scanned for files not seen before.
#[derive(Debug)]
pub struct BatchDirectory {
    dir: PathBuf,
    extension: String,
    seen: HashSet<PathBuf>,
}

impl BatchDirectory {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
            seen: HashSet::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns files with the configured extension that earlier scans have
    /// not returned, sorted by name. Each file is returned once.
    pub fn scan(&mut self) -> io::Result<Vec<PathBuf>> {
        let mut fresh = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let matches = path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension.as_str()));
            if matches && !self.seen.contains(&path) {
                fresh.push(path);
            }
        }
        fresh.sort();
        self.seen.extend(fresh.iter().cloned());

        debug!("Scanned {}: {} new batch files", self.dir.display(), fresh.len());
        Ok(fresh)
    }
}
