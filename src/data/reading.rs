use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three host resources that are sampled and alerted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Memory,
    Disk,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::Cpu, MetricKind::Memory, MetricKind::Disk];

    /// Display name used in alert subjects and chart labels
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "CPU",
            MetricKind::Memory => "Memory",
            MetricKind::Disk => "Disk",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            MetricKind::Cpu => 0,
            MetricKind::Memory => 1,
            MetricKind::Disk => 2,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Cpu => write!(f, "cpu"),
            MetricKind::Memory => write!(f, "memory"),
            MetricKind::Disk => write!(f, "disk"),
        }
    }
}

/// One timestamped snapshot of host utilization, all values in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "cpu")]
    pub cpu_pct: f64,
    #[serde(rename = "memory")]
    pub memory_pct: f64,
    /// Zero when the platform has no root filesystem query
    #[serde(rename = "disk", default)]
    pub disk_pct: f64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, cpu_pct: f64, memory_pct: f64, disk_pct: f64) -> Self {
        Self {
            cpu_pct,
            memory_pct,
            disk_pct,
            timestamp,
        }
    }

    pub fn value(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Cpu => self.cpu_pct,
            MetricKind::Memory => self.memory_pct,
            MetricKind::Disk => self.disk_pct,
        }
    }
}

/// A reading as persisted by the store, carrying its surrogate id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
}

impl StoredRow {
    pub fn from_reading(id: u64, reading: &Reading) -> Self {
        Self {
            id,
            timestamp: reading.timestamp,
            cpu_usage: reading.cpu_pct,
            memory_usage: reading.memory_pct,
            disk_usage: reading.disk_pct,
        }
    }

    pub fn value(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Cpu => self.cpu_usage,
            MetricKind::Memory => self.memory_usage,
            MetricKind::Disk => self.disk_usage,
        }
    }
}

/// Round a percentage to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reading_json_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let reading = Reading::new(ts, 12.5, 40.25, 0.0);

        let json = serde_json::to_value(reading).unwrap();
        assert_eq!(json["cpu"], 12.5);
        assert_eq!(json["memory"], 40.25);
        assert_eq!(json["disk"], 0.0);
        assert!(json["timestamp"].as_str().unwrap().starts_with("2024-05-01T12:00:00"));
    }

    #[test]
    fn test_missing_disk_defaults_to_zero() {
        let reading: Reading =
            serde_json::from_str(r#"{"cpu":1.0,"memory":2.0,"timestamp":"2024-05-01T12:00:00Z"}"#)
                .unwrap();
        assert_eq!(reading.disk_pct, 0.0);
    }

    #[test]
    fn test_row_keeps_reading_values() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let row = StoredRow::from_reading(7, &Reading::new(ts, 1.0, 2.0, 3.0));

        assert_eq!(row.id, 7);
        assert_eq!(row.value(MetricKind::Cpu), 1.0);
        assert_eq!(row.value(MetricKind::Memory), 2.0);
        assert_eq!(row.value(MetricKind::Disk), 3.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(33.33333), 33.33);
        assert_eq!(round2(66.666), 66.67);
        assert_eq!(round2(0.0), 0.0);
    }
}
