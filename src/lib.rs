//! Hostpulse: host resource monitor
//!
//! Samples CPU, memory and disk utilisation on a fixed period, keeps the
//! readings in a file-backed store, raises threshold alerts with a cooldown,
//! and serves current and historical readings over HTTP.
//!
//! # Example
//!
//! ```no_run
//! use hostpulse::sampler::{Sampler, SystemSampler};
//! use hostpulse::storage::MetricStore;
//!
//! let store = MetricStore::open("./system_metrics.jsonl").unwrap();
//! let reading = SystemSampler::new().sample().unwrap();
//! let row = store.insert(&reading).unwrap();
//! println!("stored row {} at {}", row.id, row.timestamp);
//! ```

pub mod alerts;
pub mod api;
pub mod collector;
pub mod data;
pub mod query;
pub mod sampler;
pub mod storage;

// Re-export commonly used types
pub use alerts::{ThresholdConfig, ThresholdEvaluator};
pub use collector::{Collector, CollectorHandle};
pub use data::{MetricKind, Reading, StoredRow};
pub use query::{QueryError, QueryService};
pub use sampler::{SampleError, Sampler, SystemSampler};
pub use storage::{MetricStore, StoreError};
