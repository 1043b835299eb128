//! Host facts reported in the async environment snapshot

use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

/// Host facts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostFacts {
    pub hostname: String,

    /// Operating system name and version
    pub os: String,

    pub kernel_version: String,

    /// Number of CPU cores
    pub cpu_count: usize,

    /// Memory in bytes
    pub memory_used: u64,
    pub memory_total: u64,

    /// Disk space in bytes, summed over all mounted disks
    pub disk_used: u64,
    pub disk_total: u64,

    /// System uptime in seconds
    pub uptime_secs: u64,
}

/// Collect host facts; blocking, call from `spawn_blocking`
pub fn collect_host_facts() -> HostFacts {
    let mut sys = System::new_all();
    sys.refresh_all();

    let disks = Disks::new_with_refreshed_list();
    let (disk_used, disk_total) = disks.iter().fold((0u64, 0u64), |(used, total), disk| {
        (
            used + disk.total_space().saturating_sub(disk.available_space()),
            total + disk.total_space(),
        )
    });

    let os = match (System::name(), System::os_version()) {
        (Some(name), Some(version)) => format!("{} {}", name, version),
        (Some(name), None) => name,
        _ => std::env::consts::OS.to_string(),
    };

    HostFacts {
        hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
        os,
        kernel_version: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
        cpu_count: sys.cpus().len(),
        memory_used: sys.used_memory(),
        memory_total: sys.total_memory(),
        disk_used,
        disk_total,
        uptime_secs: System::uptime(),
    }
}
