//! Emberlog - embedded segmented indexed event log.
//!
//! An append-only record store backed by fixed-size memory-mapped segment
//! files, each carrying an in-memory inverted index over a configurable
//! subset of fields, plus a selectivity-driven multi-predicate query engine
//! that walks records most-recent-first.
//!
//! # Components
//!
//! - [`LogStore`]: owner of schema, configuration, and segments; the
//!   ingestion and query entry points
//! - [`SegmentStore`]: segment ordering, rotation, and retention
//! - [`Segment`]: one capacity-bounded mapped file plus its index
//! - [`SearchQuery`] / [`Predicate`]: query parsing and planning
//!
//! # Example
//!
//! ```rust,ignore
//! use emberlog::{FieldSchema, LogStore, SearchQuery, StoreConfig};
//!
//! let schema = FieldSchema::new(&["ts", "user", "action"], &["action"]);
//! let config = StoreConfig::new("/var/lib/events/db")
//!     .with_segment_capacity(100 * 1024 * 1024)
//!     .with_retention_count(100);
//! let mut store = LogStore::open(config, schema)?;
//!
//! // One record per newline-terminated line, fields tab-separated; the
//! // first field is the event timestamp.
//! store.ingest(b"1700000000\talice\tlogin\n")?;
//!
//! // Indexed equality drives the search; other predicates filter.
//! let query = SearchQuery::from_params(
//!     vec![("action", "login"), ("_limit", "50")],
//!     store.schema(),
//! );
//! for record in store.search(&query) {
//!     println!("{}", String::from_utf8_lossy(&record.join(b'\t')));
//! }
//! ```

#![deny(missing_docs)]

pub mod config;
pub mod db;
pub mod error;
pub mod query;
pub mod record;
pub mod schema;
pub mod segment;
pub mod stats;
pub mod store;

pub use config::StoreConfig;
pub use db::LogStore;
pub use error::{LogError, Result};
pub use query::{Comparator, Predicate, SearchQuery};
pub use record::Record;
pub use schema::FieldSchema;
pub use segment::{Segment, TimeBounds};
pub use stats::{IndexListing, SegmentStats, StoreStats};
pub use store::SegmentStore;
