pub mod engine;
pub mod log;

pub use engine::{MetricStore, StoreError, INITIAL_ROW_ID};
pub use log::RowLog;
