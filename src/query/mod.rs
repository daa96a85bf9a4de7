pub mod service;

pub use service::{
    validate_hours, QueryError, QueryService, DEFAULT_HISTORY_HOURS, MAX_HISTORY_HOURS,
    MIN_HISTORY_HOURS,
};
