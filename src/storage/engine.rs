use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::log::RowLog;
use crate::data::{Reading, StoredRow};

/// First id handed out by an empty store
pub const INITIAL_ROW_ID: u64 = 1;

struct Writer {
    log: RowLog,
    next_id: u64,
}

/// Durable append-only time series of readings.
///
/// Writes are serialized through the writer mutex; reads only touch the
/// in-memory row index and never wait for a writer to finish its file IO.
pub struct MetricStore {
    path: PathBuf,
    /// Rows in insertion (id) order
    rows: RwLock<Vec<StoredRow>>,
    /// `None` once the store has been closed
    writer: Mutex<Option<Writer>>,
    closed: AtomicBool,
}

impl MetricStore {
    /// Open the store at `path`, replaying rows left by a previous run
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let (log, rows) = RowLog::open(path.as_ref())?;
        let next_id = rows
            .iter()
            .map(|r| r.id)
            .max()
            .map_or(INITIAL_ROW_ID, |max| max + 1);

        tracing::info!(
            path = %log.path().display(),
            rows = rows.len(),
            "Metric store opened"
        );

        Ok(Self {
            path: log.path().to_path_buf(),
            rows: RwLock::new(rows),
            writer: Mutex::new(Some(Writer { log, next_id })),
            closed: AtomicBool::new(false),
        })
    }

    /// Append a reading, returning the stored row with its new id
    pub fn insert(&self, reading: &Reading) -> Result<StoredRow, StoreError> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(StoreError::Closed)?;

        let row = StoredRow::from_reading(writer.next_id, reading);
        writer.log.append(&row)?;
        writer.next_id += 1;

        self.rows.write().push(row.clone());

        tracing::debug!(id = row.id, "Metrics stored");
        Ok(row)
    }

    /// All rows with `timestamp >= since`, ascending by timestamp
    pub fn query_range(&self, since: DateTime<Utc>) -> Result<Vec<StoredRow>, StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }

        let mut result: Vec<StoredRow> = {
            let rows = self.rows.read();
            rows.iter().filter(|r| r.timestamp >= since).cloned().collect()
        };

        // Rows arrive in timestamp order from a single writer; the sort only
        // matters for readings whose clock stepped backwards.
        result.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    /// Delete every row and restart ids from [`INITIAL_ROW_ID`].
    ///
    /// Returns the number of rows removed.
    pub fn wipe(&self) -> Result<usize, StoreError> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(StoreError::Closed)?;

        writer.log.truncate()?;
        writer.next_id = INITIAL_ROW_ID;

        let removed = {
            let mut rows = self.rows.write();
            let removed = rows.len();
            rows.clear();
            removed
        };

        tracing::info!(removed, "All metrics wiped from store");
        Ok(removed)
    }

    /// Flush and release the backing file. Later calls return `Closed`.
    pub fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.writer.lock();
        let mut writer = guard.take().ok_or(StoreError::Closed)?;
        self.closed.store(true, Ordering::SeqCst);

        writer.log.sync()?;
        tracing::info!(path = %self.path.display(), "Metric store closed");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupted metric log: {0}")]
    Corrupted(String),

    #[error("Metric store is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn open_store(dir: &TempDir) -> MetricStore {
        MetricStore::open(dir.path().join("metrics.jsonl")).unwrap()
    }

    fn reading_at(ts: DateTime<Utc>, cpu: f64) -> Reading {
        Reading::new(ts, cpu, 40.0, 50.0)
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);

        let ids: Vec<u64> = (0..100)
            .map(|i| {
                store
                    .insert(&reading_at(base_time() + Duration::seconds(i), 1.0))
                    .unwrap()
                    .id
            })
            .collect();

        let expected: Vec<u64> = (1..=100).collect();
        assert_eq!(ids, expected);
        assert_eq!(store.len(), 100);
    }

    #[test]
    fn test_query_range_filters_and_orders() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let t = base_time();

        store.insert(&reading_at(t, 50.0)).unwrap();
        store.insert(&reading_at(t + Duration::minutes(10), 60.0)).unwrap();
        store.insert(&reading_at(t + Duration::minutes(20), 70.0)).unwrap();

        let rows = store.query_range(t + Duration::minutes(5)).unwrap();
        let cpu: Vec<f64> = rows.iter().map(|r| r.cpu_usage).collect();
        assert_eq!(cpu, vec![60.0, 70.0]);
    }

    #[test]
    fn test_query_range_is_inclusive() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let t = base_time();

        store.insert(&reading_at(t, 1.0)).unwrap();
        assert_eq!(store.query_range(t).unwrap().len(), 1);
        assert!(store.query_range(t + Duration::milliseconds(1)).unwrap().is_empty());
    }

    #[test]
    fn test_query_range_sorts_backwards_clock() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        let t = base_time();

        store.insert(&reading_at(t + Duration::minutes(1), 2.0)).unwrap();
        store.insert(&reading_at(t, 1.0)).unwrap();

        let rows = store.query_range(t).unwrap();
        assert_eq!(rows[0].cpu_usage, 1.0);
        assert_eq!(rows[1].cpu_usage, 2.0);
    }

    #[test]
    fn test_wipe_resets_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);

        for i in 0..3 {
            store.insert(&reading_at(base_time() + Duration::seconds(i), 1.0)).unwrap();
        }
        assert_eq!(store.wipe().unwrap(), 3);
        assert!(store.query_range(base_time() - Duration::hours(168)).unwrap().is_empty());

        let row = store.insert(&reading_at(base_time(), 1.0)).unwrap();
        assert_eq!(row.id, INITIAL_ROW_ID);
    }

    #[test]
    fn test_reopen_continues_ids() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = open_store(&temp_dir);
            store.insert(&reading_at(base_time(), 1.0)).unwrap();
            store.insert(&reading_at(base_time(), 2.0)).unwrap();
            store.close().unwrap();
        }

        let store = open_store(&temp_dir);
        assert_eq!(store.len(), 2);
        assert_eq!(store.insert(&reading_at(base_time(), 3.0)).unwrap().id, 3);
    }

    #[test]
    fn test_wipe_then_close_leaves_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = open_store(&temp_dir);
            store.insert(&reading_at(base_time(), 1.0)).unwrap();
            store.wipe().unwrap();
            store.close().unwrap();
        }

        let store = open_store(&temp_dir);
        assert!(store.is_empty());
        assert_eq!(store.insert(&reading_at(base_time(), 1.0)).unwrap().id, 1);
    }

    #[test]
    fn test_reopen_after_torn_write() {
        use std::io::Write;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metrics.jsonl");
        {
            let store = open_store(&temp_dir);
            store.insert(&reading_at(base_time(), 1.0)).unwrap();

            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(br#"{"id":2,"timest"#).unwrap();
            drop(file);

            assert_eq!(store.insert(&reading_at(base_time(), 2.0)).unwrap().id, 2);
            store.close().unwrap();
        }

        let store = MetricStore::open(&path).unwrap();
        let rows = store.query_range(base_time()).unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(rows[1].cpu_usage, 2.0);
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        store.close().unwrap();

        assert!(matches!(
            store.insert(&reading_at(base_time(), 1.0)),
            Err(StoreError::Closed)
        ));
        assert!(matches!(store.query_range(base_time()), Err(StoreError::Closed)));
        assert!(matches!(store.wipe(), Err(StoreError::Closed)));
        assert!(matches!(store.close(), Err(StoreError::Closed)));
    }

    #[test]
    fn test_concurrent_inserts_and_reads() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(open_store(&temp_dir));

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let ts = base_time() + Duration::seconds(w * 100 + i);
                        store.insert(&reading_at(ts, 1.0)).unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let rows = store.query_range(base_time()).unwrap();
                    assert!(rows.len() <= 100);
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();

        let mut ids: Vec<u64> = store
            .query_range(base_time())
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=100).collect::<Vec<u64>>());
    }
}
