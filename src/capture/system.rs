//! Host resource sampling

use std::collections::BTreeMap;
use std::thread;
use sysinfo::{Disks, MINIMUM_CPU_UPDATE_INTERVAL, System};
use tracing::info;

use super::network::capture_connections;
use crate::proc_info::ProcessInspector;
use crate::snapshot::{DiskUsage, MemoryUsage, SystemState, now_timestamp};

/// CPU, memory, disks, sockets and process count
///
/// Blocks for one CPU sampling window.
pub fn capture_system_state(processes: &dyn ProcessInspector) -> SystemState {
    let mut sys = System::new();
    sys.refresh_cpu_usage();
    thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let state = SystemState {
        timestamp: now_timestamp(),
        cpu_usage: finite(f64::from(sys.global_cpu_usage())),
        memory_usage: memory_usage(&sys),
        disk_usage: disk_usage(),
        network_connections: capture_connections(processes),
        running_processes: processes.pids().len(),
    };

    info!(
        cpu_percent = state.cpu_usage,
        memory_percent = state.memory_usage.percent,
        disks = state.disk_usage.len(),
        connections = state.network_connections.len(),
        processes = state.running_processes,
        "Captured system state"
    );
    state
}

fn memory_usage(sys: &System) -> MemoryUsage {
    let total = sys.total_memory();
    let available = sys.available_memory();
    MemoryUsage {
        total,
        available,
        used: sys.used_memory(),
        free: sys.free_memory(),
        percent: percent(total.saturating_sub(available), total),
        swap_total: sys.total_swap(),
        swap_used: sys.used_swap(),
    }
}

/// Usage per mount point; mounts reporting no capacity are skipped
fn disk_usage() -> BTreeMap<String, DiskUsage> {
    Disks::new_with_refreshed_list()
        .list()
        .iter()
        .filter(|disk| disk.total_space() > 0)
        .map(|disk| {
            let total = disk.total_space();
            let free = disk.available_space();
            let used = total.saturating_sub(free);
            (
                disk.mount_point().display().to_string(),
                DiskUsage {
                    total,
                    used,
                    free,
                    percent: percent(used, total),
                },
            )
        })
        .collect()
}

/// Percent rounded to one decimal
fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

/// NaN and infinities don't survive a JSON round trip
fn finite(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProcesses;

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(5, 5), 100.0);
    }

    #[test]
    fn test_finite() {
        assert_eq!(finite(f64::NAN), 0.0);
        assert_eq!(finite(f64::INFINITY), 0.0);
        assert_eq!(finite(12.5), 12.5);
    }

    #[test]
    fn test_capture_system_state() {
        let processes = FakeProcesses::new().with_process(1, "/", &[]).with_process(2, "/", &[]);
        let state = capture_system_state(&processes);
        assert_eq!(state.running_processes, 2);
        assert!(state.cpu_usage.is_finite());
        assert!(state.cpu_usage >= 0.0);
        assert!(state.memory_usage.percent <= 100.0);
        assert!(chrono::DateTime::parse_from_rfc3339(&state.timestamp).is_ok());
    }
}
