use super::Snapshot;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// CPU utilization between two consecutive snapshots, scaled by the number
/// of CPUs visible to the container (so a busy 2-CPU container reads 200%).
///
/// Returns 0.0 without a baseline, and when either counter did not move
/// forward (first tick, counter reset or wraparound).
pub fn cpu_percent(previous: Option<&Snapshot>, current: &Snapshot) -> f64 {
    let previous = match previous {
        Some(p) => p,
        None => return 0.0,
    };

    let cpu_delta = current.cpu_total_ns as i128 - previous.cpu_total_ns as i128;
    let system_delta = current.system_cpu_ns as i128 - previous.system_cpu_ns as i128;

    if cpu_delta > 0 && system_delta > 0 {
        (cpu_delta as f64 / system_delta as f64) * current.cpu_count as f64 * 100.0
    } else {
        0.0
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}
