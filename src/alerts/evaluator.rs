//! Per-metric threshold state machine with notification cooldown

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use super::config::ThresholdSource;
use super::notifier::{AlertMessage, Notify};
use crate::data::{MetricKind, Reading};

/// Minimum time between two notifications for the same metric
pub const ALERT_COOLDOWN: Duration = Duration::from_secs(15 * 60);

/// Alert state of one metric kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertState {
    /// When the last notification was attempted
    #[serde(rename = "lastAlerted")]
    pub last_alerted_at: Option<DateTime<Utc>>,
    /// Whether the metric is currently above its threshold
    pub is_active: bool,
}

/// Snapshot of all three alert states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertStatus {
    pub cpu: AlertState,
    pub memory: AlertState,
    pub disk: AlertState,
}

impl AlertStatus {
    pub fn get(&self, kind: MetricKind) -> AlertState {
        match kind {
            MetricKind::Cpu => self.cpu,
            MetricKind::Memory => self.memory,
            MetricKind::Disk => self.disk,
        }
    }
}

/// Result of evaluating one reading
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub any_alert_sent: bool,
    /// Metric kinds whose alert fired, in cpu/memory/disk order
    pub fired: Vec<MetricKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    /// Above threshold and out of cooldown: notify
    Fire,
    /// Above threshold again but still inside cooldown: mark active quietly
    Reactivate,
    /// Back at or below threshold
    Clear,
    Hold,
}

/// Next step for one metric given its latest value.
///
/// `is_active` always means "currently above threshold". A metric that
/// clears and climbs back over its threshold inside the cooldown is marked
/// active again without a notification (`Reactivate`) rather than being
/// reported inactive until the cooldown runs out.
fn transition(
    state: &AlertState,
    value: f64,
    threshold: f64,
    now: DateTime<Utc>,
    cooldown: chrono::Duration,
) -> Transition {
    if value > threshold {
        let cooled_down = state
            .last_alerted_at
            .map_or(true, |last| now - last > cooldown);

        if cooled_down {
            Transition::Fire
        } else if !state.is_active {
            Transition::Reactivate
        } else {
            Transition::Hold
        }
    } else if state.is_active {
        Transition::Clear
    } else {
        Transition::Hold
    }
}

/// Owns the alert state for cpu, memory and disk.
///
/// Only the collector calls [`evaluate`](Self::evaluate); the status
/// endpoint reads through [`status`](Self::status). Each metric's state is
/// replaced as a whole under its own lock so readers never see a half
/// update.
pub struct ThresholdEvaluator {
    thresholds: Arc<dyn ThresholdSource>,
    notifier: Arc<dyn Notify>,
    cooldown: chrono::Duration,
    states: [RwLock<AlertState>; 3],
}

impl ThresholdEvaluator {
    pub fn new(thresholds: Arc<dyn ThresholdSource>, notifier: Arc<dyn Notify>) -> Self {
        Self::with_cooldown(thresholds, notifier, ALERT_COOLDOWN)
    }

    pub fn with_cooldown(
        thresholds: Arc<dyn ThresholdSource>,
        notifier: Arc<dyn Notify>,
        cooldown: Duration,
    ) -> Self {
        Self {
            thresholds,
            notifier,
            cooldown: chrono::Duration::from_std(cooldown)
                .unwrap_or_else(|_| chrono::Duration::seconds(ALERT_COOLDOWN.as_secs() as i64)),
            states: Default::default(),
        }
    }

    /// Current thresholds, re-read from the source
    pub fn thresholds(&self) -> super::config::ThresholdConfig {
        self.thresholds.load()
    }

    pub fn state(&self, kind: MetricKind) -> AlertState {
        *self.states[kind.index()].read()
    }

    pub fn status(&self) -> AlertStatus {
        AlertStatus {
            cpu: self.state(MetricKind::Cpu),
            memory: self.state(MetricKind::Memory),
            disk: self.state(MetricKind::Disk),
        }
    }

    pub async fn evaluate(&self, reading: &Reading) -> Evaluation {
        self.evaluate_at(reading, Utc::now()).await
    }

    /// Evaluate a reading as of `now`.
    ///
    /// State transitions commit before any notification is attempted and are
    /// never rolled back on delivery failure.
    pub async fn evaluate_at(&self, reading: &Reading, now: DateTime<Utc>) -> Evaluation {
        let thresholds = self.thresholds.load();
        let mut pending = Vec::new();

        for kind in MetricKind::ALL {
            let value = reading.value(kind);
            let threshold = thresholds.get(kind);
            let mut state = self.states[kind.index()].write();

            match transition(&state, value, threshold, now, self.cooldown) {
                Transition::Fire => {
                    *state = AlertState {
                        last_alerted_at: Some(now),
                        is_active: true,
                    };
                    pending.push(AlertMessage {
                        kind,
                        value,
                        threshold,
                        at: now,
                    });
                }
                Transition::Reactivate => {
                    *state = AlertState {
                        is_active: true,
                        ..*state
                    };
                }
                Transition::Clear => {
                    *state = AlertState {
                        is_active: false,
                        ..*state
                    };
                    tracing::info!(metric = %kind, value, threshold, "Alert cleared");
                }
                Transition::Hold => {}
            }
        }

        let mut fired = Vec::with_capacity(pending.len());
        for message in pending {
            tracing::warn!(
                metric = %message.kind,
                value = message.value,
                threshold = message.threshold,
                "Threshold exceeded"
            );

            if let Err(e) = self.notifier.notify(&message).await {
                tracing::error!(metric = %message.kind, error = %e, "Failed to send alert");
            }
            fired.push(message.kind);
        }

        Evaluation {
            any_alert_sent: !fired.is_empty(),
            fired,
        }
    }
}
