//! Host sampling
//!
//! A [`Sampler`] produces one [`Reading`] per call. Sampling blocks for the
//! CPU measurement window, so async callers go through [`sample_off_thread`].

pub mod cpu;
pub mod disk;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use sysinfo::System;

use crate::data::Reading;

/// Window between the two CPU tick snapshots
pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Source of host readings
pub trait Sampler: Send + Sync {
    /// Take one reading. May block for the CPU measurement window.
    fn sample(&self) -> Result<Reading, SampleError>;
}

/// Samples the local host through `/proc/stat` and sysinfo
pub struct SystemSampler {
    cpu_window: Duration,
    system: Mutex<System>,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self::with_cpu_window(CPU_SAMPLE_WINDOW)
    }

    pub fn with_cpu_window(cpu_window: Duration) -> Self {
        Self {
            cpu_window,
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SystemSampler {
    /// Individual metric failures are logged and reported as 0 so one
    /// broken reader never discards the whole reading.
    fn sample(&self) -> Result<Reading, SampleError> {
        let cpu = cpu::measure(self.cpu_window).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to measure cpu usage");
            0.0
        });

        let memory = memory::read(&mut self.system.lock());

        let disk = disk::read_root().unwrap_or_else(|e| {
            match e {
                SampleError::Unsupported(reason) => {
                    tracing::info!("Disk usage unavailable: {}", reason)
                }
                e => tracing::error!(error = %e, "Failed to measure disk usage"),
            }
            0.0
        });

        Ok(Reading::new(Utc::now(), cpu, memory, disk))
    }
}

/// Run a sampler on the blocking pool so the CPU window never stalls
/// request handling or the runtime's worker threads.
pub async fn sample_off_thread(sampler: Arc<dyn Sampler>) -> Result<Reading, SampleError> {
    tokio::task::spawn_blocking(move || sampler.sample())
        .await
        .map_err(|e| SampleError::Worker(e.to_string()))?
}

/// Sampling errors
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported: {0}")]
    Unsupported(&'static str),

    #[error("Sampling task failed: {0}")]
    Worker(String),
}
