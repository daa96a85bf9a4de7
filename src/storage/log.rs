//! Append-only JSON-lines file backing the metric store

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::StoreError;
use crate::data::StoredRow;

/// Writer half of the row log. One row per line.
pub struct RowLog {
    path: PathBuf,
    file: File,
    /// End of the last complete row
    len: u64,
}

impl RowLog {
    /// Open (or create) the log and replay every complete row in it.
    ///
    /// A partial last line left by a crash mid-write is dropped and the file
    /// is cut back to the last complete row.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<StoredRow>), StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let (rows, valid_len) = Self::replay(&mut file)?;

        if valid_len < file.metadata()?.len() {
            tracing::warn!(
                path = %path.display(),
                "Dropping incomplete trailing row from metric log"
            );
            file.set_len(valid_len)?;
        }

        Ok((
            Self {
                path,
                file,
                len: valid_len,
            },
            rows,
        ))
    }

    fn replay(file: &mut File) -> Result<(Vec<StoredRow>, u64), StoreError> {
        file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&*file);
        let mut rows = Vec::new();
        let mut valid_len: u64 = 0;
        let mut line = String::new();
        let mut line_no = 0usize;

        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            line_no += 1;

            let complete = line.ends_with('\n');
            let trimmed = line.trim();

            if trimmed.is_empty() {
                if complete {
                    valid_len += read as u64;
                }
                continue;
            }

            // Unterminated last line: the write never finished
            if !complete {
                break;
            }

            let row = serde_json::from_str::<StoredRow>(trimmed)
                .map_err(|e| StoreError::Corrupted(format!("line {}: {}", line_no, e)))?;
            rows.push(row);
            valid_len += read as u64;
        }

        Ok((rows, valid_len))
    }

    /// Append one row and flush it to the OS.
    ///
    /// A write that fails part way is cut back off the file, so the next
    /// row never lands on the tail of a torn one.
    pub fn append(&mut self, row: &StoredRow) -> Result<(), StoreError> {
        let mut line =
            serde_json::to_vec(row).map_err(|e| StoreError::Serialization(e.to_string()))?;
        line.push(b'\n');

        // Leftovers from an earlier failed write
        if self.file.metadata()?.len() != self.len {
            self.file.set_len(self.len)?;
        }

        if let Err(e) = self.file.write_all(&line).and_then(|_| self.file.flush()) {
            if let Err(cut) = self.file.set_len(self.len) {
                tracing::error!(error = %cut, "Failed to cut back partial row");
            }
            return Err(e.into());
        }

        self.len += line.len() as u64;
        Ok(())
    }

    /// Remove every row from the file
    pub fn truncate(&mut self) -> Result<(), StoreError> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.len = 0;
        Ok(())
    }

    /// Flush and fsync before the handle is dropped
    pub fn sync(&mut self) -> Result<(), StoreError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Reading;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn row(id: u64) -> StoredRow {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        StoredRow::from_reading(id, &Reading::new(ts, 10.0, 20.0, 30.0))
    }

    #[test]
    fn test_append_and_replay() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metrics.jsonl");

        {
            let (mut log, rows) = RowLog::open(&path).unwrap();
            assert!(rows.is_empty());
            log.append(&row(1)).unwrap();
            log.append(&row(2)).unwrap();
        }

        let (_log, rows) = RowLog::open(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].id, 2);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/metrics.jsonl");

        let (log, _) = RowLog::open(&path).unwrap();
        assert!(log.path().exists());
    }

    #[test]
    fn test_partial_trailing_line_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metrics.jsonl");

        {
            let (mut log, _) = RowLog::open(&path).unwrap();
            log.append(&row(1)).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"id":2,"timestamp":"2024-05"#).unwrap();
        drop(file);

        let (mut log, rows) = RowLog::open(&path).unwrap();
        assert_eq!(rows.len(), 1);

        // The next append starts on a clean line
        log.append(&row(2)).unwrap();
        drop(log);
        let (_log, rows) = RowLog::open(&path).unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_append_after_torn_write_starts_clean_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metrics.jsonl");

        let (mut log, _) = RowLog::open(&path).unwrap();
        log.append(&row(1)).unwrap();

        // Bytes of a row whose write failed part way
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"id":2,"timest"#).unwrap();
        drop(file);

        log.append(&row(2)).unwrap();
        log.append(&row(3)).unwrap();
        drop(log);

        let (_log, rows) = RowLog::open(&path).unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_corrupted_middle_line_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metrics.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        assert!(matches!(RowLog::open(&path), Err(StoreError::Corrupted(_))));
    }

    #[test]
    fn test_truncate_empties_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metrics.jsonl");

        let (mut log, _) = RowLog::open(&path).unwrap();
        log.append(&row(1)).unwrap();
        log.truncate().unwrap();
        log.append(&row(1)).unwrap();
        drop(log);

        let (_log, rows) = RowLog::open(&path).unwrap();
        assert_eq!(rows.len(), 1);
    }
}
