//! Root filesystem usage

use super::SampleError;
use crate::data::round2;

/// Used share of a filesystem, rounded to two decimals
pub fn usage_pct(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let used = total.saturating_sub(available);
    round2(used as f64 / total as f64 * 100.0)
}

#[cfg(not(windows))]
pub fn read_root() -> Result<f64, SampleError> {
    use std::path::Path;
    use sysinfo::Disks;

    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .ok_or(SampleError::Unsupported("no filesystem mounted at /"))?;

    Ok(usage_pct(root.total_space(), root.available_space()))
}

// Known platform gap: no root filesystem query on Windows.
#[cfg(windows)]
pub fn read_root() -> Result<f64, SampleError> {
    Err(SampleError::Unsupported("disk usage is not supported on Windows"))
}
