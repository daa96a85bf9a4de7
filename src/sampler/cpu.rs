//! CPU utilization from two time-separated tick snapshots

use std::time::Duration;

use super::SampleError;
use crate::data::round2;

/// Cumulative tick counters for a single core
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreTicks {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CoreTicks {
    /// Sum over every tick kind
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}

/// Per-core tick counters captured at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuSnapshot {
    pub cores: Vec<CoreTicks>,
}

impl CpuSnapshot {
    pub fn new(cores: Vec<CoreTicks>) -> Self {
        Self { cores }
    }

    /// Parse the per-core `cpuN` lines of `/proc/stat`.
    ///
    /// The aggregate `cpu` line is skipped; cores are summed by
    /// [`usage_between`] instead so both platforms share one formula.
    pub fn parse_proc_stat(contents: &str) -> Result<Self, SampleError> {
        let mut cores = Vec::new();

        for line in contents.lines() {
            let mut fields = line.split_whitespace();
            let Some(label) = fields.next() else {
                continue;
            };
            if !label.starts_with("cpu") || label == "cpu" {
                continue;
            }

            let values: Vec<u64> = fields
                .take(8)
                .map(|f| {
                    f.parse::<u64>()
                        .map_err(|e| SampleError::Parse(format!("{}: {}", label, e)))
                })
                .collect::<Result<_, _>>()?;

            if values.len() < 4 {
                return Err(SampleError::Parse(format!(
                    "{}: expected at least 4 tick columns, found {}",
                    label,
                    values.len()
                )));
            }

            let at = |i: usize| values.get(i).copied().unwrap_or(0);
            cores.push(CoreTicks {
                user: at(0),
                nice: at(1),
                system: at(2),
                idle: at(3),
                iowait: at(4),
                irq: at(5),
                softirq: at(6),
                steal: at(7),
            });
        }

        if cores.is_empty() {
            return Err(SampleError::Parse("no per-core cpu lines".to_string()));
        }

        Ok(Self { cores })
    }

    #[cfg(target_os = "linux")]
    pub fn read() -> Result<Self, SampleError> {
        let contents = std::fs::read_to_string("/proc/stat")?;
        Self::parse_proc_stat(&contents)
    }
}

/// Aggregate usage across cores between two snapshots.
///
/// `100 - 100 * sum(idle_delta) / sum(total_delta)`, rounded to two
/// decimals. A zero total delta yields 0 rather than NaN.
pub fn usage_between(start: &CpuSnapshot, end: &CpuSnapshot) -> f64 {
    let mut idle_delta: u64 = 0;
    let mut total_delta: u64 = 0;

    for (before, after) in start.cores.iter().zip(end.cores.iter()) {
        idle_delta += after.idle.saturating_sub(before.idle);
        total_delta += after.total().saturating_sub(before.total());
    }

    if total_delta == 0 {
        return 0.0;
    }

    let idle_pct = idle_delta as f64 / total_delta as f64 * 100.0;
    round2((100.0 - idle_pct).clamp(0.0, 100.0))
}

/// Blocking measurement: snapshot, sleep `window`, snapshot again
#[cfg(target_os = "linux")]
pub fn measure(window: Duration) -> Result<f64, SampleError> {
    let start = CpuSnapshot::read()?;
    std::thread::sleep(window);
    let end = CpuSnapshot::read()?;
    Ok(usage_between(&start, &end))
}

/// Platforms without `/proc/stat` fall back to sysinfo's per-core usage,
/// which sysinfo derives from the same kind of tick delta.
#[cfg(not(target_os = "linux"))]
pub fn measure(window: Duration) -> Result<f64, SampleError> {
    let mut system = sysinfo::System::new();
    system.refresh_cpu_usage();
    std::thread::sleep(window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
    system.refresh_cpu_usage();

    let cpus = system.cpus();
    if cpus.is_empty() {
        return Err(SampleError::Unsupported("no cpus reported"));
    }

    let total: f32 = cpus.iter().map(|cpu| cpu.cpu_usage()).sum();
    Ok(round2((total / cpus.len() as f32) as f64))
}
