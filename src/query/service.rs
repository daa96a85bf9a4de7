use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::data::{Reading, StoredRow};
use crate::sampler::{sample_off_thread, SampleError, Sampler};
use crate::storage::{MetricStore, StoreError};

/// Smallest history window in hours
pub const MIN_HISTORY_HOURS: i64 = 1;
/// Largest history window in hours (7 days)
pub const MAX_HISTORY_HOURS: i64 = 168;
/// Window used when the caller does not pick one
pub const DEFAULT_HISTORY_HOURS: i64 = 24;

/// Read-only view used by the HTTP layer
pub struct QueryService {
    sampler: Arc<dyn Sampler>,
    store: Arc<MetricStore>,
}

impl QueryService {
    pub fn new(sampler: Arc<dyn Sampler>, store: Arc<MetricStore>) -> Self {
        Self { sampler, store }
    }

    /// A fresh measurement; bypasses the store
    pub async fn current(&self) -> Result<Reading, QueryError> {
        Ok(sample_off_thread(Arc::clone(&self.sampler)).await?)
    }

    /// Rows from the last `hours` hours, oldest first
    pub fn history(&self, hours: i64) -> Result<Vec<StoredRow>, QueryError> {
        self.history_at(hours, Utc::now())
    }

    pub fn history_at(&self, hours: i64, now: DateTime<Utc>) -> Result<Vec<StoredRow>, QueryError> {
        let hours = validate_hours(hours)?;
        let since = now - chrono::Duration::hours(hours);
        Ok(self.store.query_range(since)?)
    }
}

pub fn validate_hours(hours: i64) -> Result<i64, QueryError> {
    if (MIN_HISTORY_HOURS..=MAX_HISTORY_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(QueryError::Validation(format!(
            "Hours parameter must be between {} and {}",
            MIN_HISTORY_HOURS, MAX_HISTORY_HOURS
        )))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("{0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Sample error: {0}")]
    Sample(#[from] SampleError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    struct FixedSampler(f64);

    impl Sampler for FixedSampler {
        fn sample(&self) -> Result<Reading, SampleError> {
            Ok(Reading::new(Utc::now(), self.0, 20.0, 30.0))
        }
    }

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn service(dir: &TempDir) -> (QueryService, Arc<MetricStore>) {
        let store = Arc::new(MetricStore::open(dir.path().join("metrics.jsonl")).unwrap());
        (
            QueryService::new(Arc::new(FixedSampler(42.0)), Arc::clone(&store)),
            store,
        )
    }

    #[test]
    fn test_validate_hours() {
        assert_ok!(validate_hours(1));
        assert_ok!(validate_hours(168));
        assert_err!(validate_hours(0));
        assert_err!(validate_hours(169));
        assert_err!(validate_hours(-5));
    }

    #[test]
    fn test_invalid_hours_never_reach_store() {
        let dir = TempDir::new().unwrap();
        let (service, store) = service(&dir);
        // A closed store would fail any query that got through
        store.close().unwrap();

        assert!(matches!(service.history(0), Err(QueryError::Validation(_))));
        assert!(matches!(service.history(169), Err(QueryError::Validation(_))));
        assert!(matches!(service.history(24), Err(QueryError::Store(_))));
    }

    #[test]
    fn test_history_window() {
        let dir = TempDir::new().unwrap();
        let (service, store) = service(&dir);

        for (offset, cpu) in [(0, 50.0), (10, 60.0), (20, 70.0)] {
            store
                .insert(&Reading::new(t() + Duration::minutes(offset), cpu, 1.0, 1.0))
                .unwrap();
        }

        // now = T + 1h05m, one hour back = T + 5min
        let now = t() + Duration::minutes(65);
        let rows = service.history_at(1, now).unwrap();
        let cpu: Vec<f64> = rows.iter().map(|r| r.cpu_usage).collect();
        assert_eq!(cpu, vec![60.0, 70.0]);
    }

    #[test]
    fn test_history_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (service, store) = service(&dir);

        for i in 0..5 {
            store
                .insert(&Reading::new(t() + Duration::minutes(i), 1.0, 1.0, 1.0))
                .unwrap();
        }

        let now = t() + Duration::hours(2);
        assert_eq!(service.history_at(24, now).unwrap(), service.history_at(24, now).unwrap());
    }

    #[test]
    fn test_history_empty_after_wipe() {
        let dir = TempDir::new().unwrap();
        let (service, store) = service(&dir);

        store.insert(&Reading::new(Utc::now(), 1.0, 1.0, 1.0)).unwrap();
        store.wipe().unwrap();

        assert!(service.history(168).unwrap().is_empty());
        assert_eq!(store.insert(&Reading::new(Utc::now(), 1.0, 1.0, 1.0)).unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_current_bypasses_store() {
        let dir = TempDir::new().unwrap();
        let (service, store) = service(&dir);

        let reading = service.current().await.unwrap();
        assert_eq!(reading.cpu_pct, 42.0);
        assert!(store.is_empty());
    }
}
