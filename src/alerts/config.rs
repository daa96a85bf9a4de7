//! Threshold and notification configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::data::MetricKind;

/// Percentage ceilings per metric kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_cpu")]
    pub cpu: f64,
    #[serde(default = "default_memory")]
    pub memory: f64,
    #[serde(default = "default_disk")]
    pub disk: f64,
}

fn default_cpu() -> f64 {
    80.0
}

fn default_memory() -> f64 {
    85.0
}

fn default_disk() -> f64 {
    90.0
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu: default_cpu(),
            memory: default_memory(),
            disk: default_disk(),
        }
    }
}

impl ThresholdConfig {
    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Cpu => self.cpu,
            MetricKind::Memory => self.memory,
            MetricKind::Disk => self.disk,
        }
    }
}

/// Where thresholds come from. Consulted on every evaluation.
pub trait ThresholdSource: Send + Sync {
    fn load(&self) -> ThresholdConfig;
}

/// Reads thresholds from a JSON file on every call, so operators can
/// change limits without a restart
#[derive(Debug, Clone)]
pub struct ThresholdFile {
    path: PathBuf,
}

impl ThresholdFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict read: `Ok(None)` when the file does not exist
    pub fn try_load(&self) -> Result<Option<ThresholdConfig>, ThresholdError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ThresholdError::Io(e)),
        };

        let config = serde_json::from_str(&data)?;
        Ok(Some(config))
    }
}

impl ThresholdSource for ThresholdFile {
    fn load(&self) -> ThresholdConfig {
        match self.try_load() {
            Ok(Some(config)) => config,
            Ok(None) => ThresholdConfig::default(),
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Error loading thresholds, using defaults"
                );
                ThresholdConfig::default()
            }
        }
    }
}

/// Fixed thresholds, used by tests and embedders without a config file
impl ThresholdSource for ThresholdConfig {
    fn load(&self) -> ThresholdConfig {
        *self
    }
}

/// Notification target
#[derive(Debug, Clone)]
pub enum NotifyTarget {
    /// Log to tracing
    Log,
    /// HTTP webhook receiving a JSON payload
    Webhook {
        url: String,
        headers: HashMap<String, String>,
    },
    /// SMTP email
    Email(EmailConfig),
}

impl NotifyTarget {
    /// Build the target list from the process environment.
    ///
    /// `Log` is always present; `Email` is added when `SMTP_HOST` is set and
    /// `Webhook` when `ALERT_WEBHOOK_URL` is set.
    pub fn from_env() -> Vec<NotifyTarget> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Vec<NotifyTarget>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut targets = vec![NotifyTarget::Log];

        if let Some(email) = EmailConfig::from_lookup(&lookup) {
            targets.push(NotifyTarget::Email(email));
        }

        if let Some(url) = lookup("ALERT_WEBHOOK_URL").filter(|u| !u.trim().is_empty()) {
            targets.push(NotifyTarget::Webhook {
                url,
                headers: HashMap::new(),
            });
        }

        targets
    }
}

/// Default SMTP port (STARTTLS)
const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP settings for email alerts
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Implicit TLS when true, STARTTLS otherwise
    pub secure: bool,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    /// Sender address; shown as "System Monitor"
    pub from_address: String,
    pub to: Vec<String>,
}

impl EmailConfig {
    /// | Variable      | Required | Default                     |
    /// |---------------|----------|-----------------------------|
    /// | `SMTP_HOST`   | yes      |                             |
    /// | `SMTP_PORT`   | no       | `587`                       |
    /// | `SMTP_SECURE` | no       | `false`                     |
    /// | `SMTP_USER`   | no       |                             |
    /// | `SMTP_PASS`   | no       |                             |
    /// | `SMTP_FROM`   | no       | `SMTP_USER`                 |
    /// | `ALERT_TO`    | no       | comma separated recipients  |
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let smtp_host = lookup("SMTP_HOST").filter(|h| !h.trim().is_empty())?;
        let smtp_user = lookup("SMTP_USER");

        let from_address = lookup("SMTP_FROM")
            .or_else(|| smtp_user.clone())
            .unwrap_or_else(|| "system-monitor@localhost".to_string());

        let to = lookup("ALERT_TO")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            smtp_host,
            smtp_port: lookup("SMTP_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            secure: lookup("SMTP_SECURE").map(|v| v == "true").unwrap_or(false),
            smtp_user,
            smtp_password: lookup("SMTP_PASS"),
            from_address,
            to,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ThresholdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid threshold file: {0}")]
    Parse(#[from] serde_json::Error),
}
