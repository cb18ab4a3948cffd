//! flowrank: filtering, aggregation and ranking of collected network flows.
//!
//! Flow batches are ingested into an append-only store. A query filters
//! the stored sessions, aggregates them into one of three views, ranks
//! the rows by the selected metric, and memoizes the result until the
//! settings or the store change.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ BatchStore  │────>│   Filters   │────>│  Aggregate  │────>│    Rank     │
//! │  (ingest)   │     │ (per query) │     │ (3 views)   │     │ (threshold) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!        │                                                           │
//!        └──── invalidates ───>  ResultCache  <──── stores ──────────┘
//! ```

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod fields;
pub mod filter;
pub mod model;
pub mod query;
pub mod rank;
pub mod settings;
pub mod store;

pub use aggregate::{LocalHostRecord, PointToPointRecord, RawRecord};
pub use error::{FilterError, IngestionError, QueryError, Result};
pub use fields::{fields_for, label, Field};
pub use filter::{FilterName, FilterSpec};
pub use model::{FlowBatch, ProtocolTuple, SessionRecord};
pub use query::{Clock, FixedClock, QueryContext, QueryStats, Report, SystemClock};
pub use settings::{Settings, SortKey, View};
pub use store::BatchStore;
