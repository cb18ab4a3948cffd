//! Domain-specific error types for flowrank.
//!
//! Uses `thiserror` for the engine's typed failures; the CLI and config
//! layers wrap them with `anyhow` context.

use std::path::PathBuf;

use thiserror::Error;

use crate::filter::FilterName;
use crate::settings::{SortKey, View};

/// Errors that can occur while ingesting a flow batch.
///
/// A failed ingestion never leaves a partial batch in the store.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read batch file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed flow batch: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(
        "Session {index} begins at {begin_time}, after its batch was collected at {collected_at}"
    )]
    BeginAfterCollect {
        index: usize,
        begin_time: i64,
        collected_at: i64,
    },
}

/// A filter value that does not match its grammar.
///
/// This is never returned as a query failure: the filter degrades to
/// "no constraint" and the error is reported as a warning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid {filter} filter '{value}' (expected format {expected}), ignoring it")]
    InvalidFormat {
        filter: FilterName,
        value: String,
        expected: &'static str,
    },
}

/// Errors raised by the query entry points. These are caller mistakes
/// and are reported rather than guessed around.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown sort key '{0}'")]
    UnknownSortKey(String),

    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("Sort key {key} cannot rank the {view} view")]
    MetricUnavailable { key: SortKey, view: View },
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
