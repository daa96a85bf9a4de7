pub mod reading;

pub use reading::{round2, MetricKind, Reading, StoredRow};
