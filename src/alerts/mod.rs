//! Threshold alerting
//!
//! Compares each reading against configured ceilings and notifies
//! configured targets, rate limited by a per-metric cooldown.

pub mod config;
pub mod evaluator;
pub mod notifier;

pub use config::{EmailConfig, NotifyTarget, ThresholdConfig, ThresholdFile, ThresholdSource};
pub use evaluator::{AlertState, AlertStatus, Evaluation, ThresholdEvaluator, ALERT_COOLDOWN};
pub use notifier::{AlertMessage, Notifier, NotifierError, Notify};
