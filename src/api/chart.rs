//! Time-series shape consumed by the charting front end

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::data::{MetricKind, Reading, StoredRow};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: &'static str,
    pub data: Vec<f64>,
    pub border_color: &'static str,
    pub background_color: &'static str,
    pub fill: bool,
}

impl Dataset {
    fn new(kind: MetricKind, data: Vec<f64>) -> Self {
        let (label, border_color, background_color) = match kind {
            MetricKind::Cpu => (
                "CPU Usage (%)",
                "rgba(255, 99, 132, 1)",
                "rgba(255, 99, 132, 0.2)",
            ),
            MetricKind::Memory => (
                "Memory Usage (%)",
                "rgba(54, 162, 235, 1)",
                "rgba(54, 162, 235, 0.2)",
            ),
            MetricKind::Disk => (
                "Disk Usage (%)",
                "rgba(75, 192, 192, 1)",
                "rgba(75, 192, 192, 0.2)",
            ),
        };

        Self {
            label,
            data,
            border_color,
            background_color,
            fill: false,
        }
    }
}

/// Labels plus one dataset per metric, in cpu/memory/disk order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

impl ChartData {
    pub fn from_rows(rows: &[StoredRow]) -> Self {
        Self {
            labels: rows.iter().map(|r| time_label(r.timestamp)).collect(),
            datasets: MetricKind::ALL
                .iter()
                .map(|kind| Dataset::new(*kind, rows.iter().map(|r| r.value(*kind)).collect()))
                .collect(),
        }
    }

    /// Single-point chart for a live reading
    pub fn from_reading(reading: &Reading) -> Self {
        Self {
            labels: vec![time_label(reading.timestamp)],
            datasets: MetricKind::ALL
                .iter()
                .map(|kind| Dataset::new(*kind, vec![reading.value(*kind)]))
                .collect(),
        }
    }
}

/// Local wall-clock time of day, e.g. `1:05:09 PM`
fn time_label(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%-I:%M:%S %p")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn rows() -> Vec<StoredRow> {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        vec![
            StoredRow::from_reading(1, &Reading::new(t, 10.0, 20.0, 30.0)),
            StoredRow::from_reading(2, &Reading::new(t + Duration::minutes(1), 11.0, 21.0, 31.0)),
        ]
    }

    #[test]
    fn test_from_rows() {
        let chart = ChartData::from_rows(&rows());

        assert_eq!(chart.labels.len(), 2);
        assert_eq!(chart.datasets.len(), 3);
        assert_eq!(chart.datasets[0].label, "CPU Usage (%)");
        assert_eq!(chart.datasets[0].data, vec![10.0, 11.0]);
        assert_eq!(chart.datasets[1].data, vec![20.0, 21.0]);
        assert_eq!(chart.datasets[2].data, vec![30.0, 31.0]);
    }

    #[test]
    fn test_empty_rows() {
        let chart = ChartData::from_rows(&[]);
        assert!(chart.labels.is_empty());
        assert!(chart.datasets.iter().all(|d| d.data.is_empty()));
    }

    #[test]
    fn test_dataset_json_keys() {
        let chart = ChartData::from_rows(&rows());
        let json = serde_json::to_value(&chart).unwrap();
        let memory = &json["datasets"][1];

        assert_eq!(memory["label"], "Memory Usage (%)");
        assert_eq!(memory["borderColor"], "rgba(54, 162, 235, 1)");
        assert_eq!(memory["backgroundColor"], "rgba(54, 162, 235, 0.2)");
        assert_eq!(memory["fill"], false);
    }

    #[test]
    fn test_from_reading_single_point() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let chart = ChartData::from_reading(&Reading::new(t, 1.0, 2.0, 3.0));

        assert_eq!(chart.labels.len(), 1);
        assert_eq!(chart.datasets[2].data, vec![3.0]);
    }
}
