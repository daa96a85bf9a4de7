use sysinfo::System;

use crate::data::round2;

/// `100 * (total - free) / total`, rounded to two decimals
pub fn usage_pct(total: u64, free: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let used = total.saturating_sub(free);
    round2(used as f64 / total as f64 * 100.0)
}

/// Point-in-time memory usage from an already constructed `System`
pub fn read(system: &mut System) -> f64 {
    system.refresh_memory();
    usage_pct(system.total_memory(), system.free_memory())
}
