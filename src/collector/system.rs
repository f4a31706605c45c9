//! Core host collectors: CPU, memory, disk, uptime and OS identity.

use chrono::{DateTime, Utc};
use sysinfo::System;

use super::{capture, CollectError, SystemSampler};
use crate::snapshot::{
    gb, round1, CpuStats, DiskStats, OsStats, PartitionStats, RamStats, SectionData, UptimeStats,
};

// =============================================================================
// CPU
// =============================================================================

/// Collect CPU load, topology and frequency.
pub fn collect_cpu(sampler: &mut SystemSampler) -> SectionData<CpuStats> {
    capture(cpu_stats(sampler))
}

fn cpu_stats(sampler: &mut SystemSampler) -> Result<CpuStats, CollectError> {
    let sys = &mut sampler.sys;
    sys.refresh_cpu();

    let cpus = sys.cpus();
    if cpus.is_empty() {
        return Err(CollectError::Unavailable("no CPUs reported".to_string()));
    }

    let model = cpus
        .first()
        .map(|c| c.brand().trim().to_string())
        .filter(|m| !m.is_empty())
        .or_else(proc_cpuinfo_model)
        .unwrap_or_else(|| "Unknown".to_string());

    let freq_mhz_current = cpus
        .first()
        .map(|c| c.frequency())
        .filter(|f| *f > 0)
        .map(|f| round1(f as f64));

    Ok(CpuStats {
        percent: round1(sys.global_cpu_info().cpu_usage() as f64),
        percent_per_core: cpus.iter().map(|c| round1(c.cpu_usage() as f64)).collect(),
        cores_logical: cpus.len(),
        cores_physical: sys.physical_core_count(),
        model,
        architecture: System::cpu_arch(),
        freq_mhz_current,
        freq_mhz_max: cpuinfo_max_freq_mhz(),
    })
}

/// CPU model from /proc/cpuinfo, the fallback on ARM boards where sysinfo
/// reports an empty brand.
fn proc_cpuinfo_model() -> Option<String> {
    let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    for line in content.lines() {
        let lower = line.to_lowercase();
        if lower.starts_with("model name") || lower.starts_with("hardware") {
            return line.split_once(':').map(|(_, v)| v.trim().to_string());
        }
    }
    None
}

/// Maximum scaling frequency from cpufreq sysfs (kHz on disk).
fn cpuinfo_max_freq_mhz() -> Option<f64> {
    let raw =
        std::fs::read_to_string("/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq").ok()?;
    raw.trim().parse::<f64>().ok().map(|khz| round1(khz / 1000.0))
}

// =============================================================================
// RAM
// =============================================================================

/// Collect memory and swap usage.
pub fn collect_ram(sampler: &mut SystemSampler) -> SectionData<RamStats> {
    capture(ram_stats(sampler))
}

fn ram_stats(sampler: &mut SystemSampler) -> Result<RamStats, CollectError> {
    let sys = &mut sampler.sys;
    sys.refresh_memory();

    let total = sys.total_memory();
    if total == 0 {
        return Err(CollectError::Unavailable("no memory reported".to_string()));
    }
    let used = sys.used_memory();
    let swap_total = sys.total_swap();
    let swap_used = sys.used_swap();

    Ok(RamStats {
        percent: round1(used as f64 / total as f64 * 100.0),
        total_gb: gb(total),
        used_gb: gb(used),
        free_gb: gb(sys.available_memory()),
        swap_total_gb: gb(swap_total),
        swap_used_gb: gb(swap_used),
        swap_percent: if swap_total > 0 {
            round1(swap_used as f64 / swap_total as f64 * 100.0)
        } else {
            0.0
        },
    })
}

// =============================================================================
// Disk
// =============================================================================

/// Collect per-partition usage plus cumulative I/O counters.
pub fn collect_disk(sampler: &mut SystemSampler) -> SectionData<DiskStats> {
    capture(disk_stats(sampler))
}

fn disk_stats(sampler: &mut SystemSampler) -> Result<DiskStats, CollectError> {
    sampler.disks.refresh_list();

    let partitions = sampler
        .disks
        .iter()
        .filter(|d| d.total_space() > 0)
        .map(|d| {
            let total = d.total_space();
            let free = d.available_space();
            let used = total.saturating_sub(free);
            PartitionStats {
                device: d.name().to_string_lossy().to_string(),
                mountpoint: d.mount_point().to_string_lossy().to_string(),
                fstype: d.file_system().to_string_lossy().to_string(),
                percent: round1(used as f64 / total as f64 * 100.0),
                total_gb: gb(total),
                used_gb: gb(used),
                free_gb: gb(free),
            }
        })
        .collect();

    let (io_read_mb, io_write_mb) = diskstats_io_totals();

    Ok(DiskStats {
        partitions,
        io_read_mb,
        io_write_mb,
    })
}

/// Cumulative read/written megabytes summed over physical block devices.
#[cfg(target_os = "linux")]
fn diskstats_io_totals() -> (Option<f64>, Option<f64>) {
    const SECTOR_SIZE: u64 = 512;

    let content = match std::fs::read_to_string("/proc/diskstats") {
        Ok(content) => content,
        Err(_) => return (None, None),
    };

    let mut sectors_read: u64 = 0;
    let mut sectors_written: u64 = 0;
    let mut seen = false;
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 || !is_physical_disk(fields[2]) {
            continue;
        }
        let read = fields[5].parse::<u64>().unwrap_or(0);
        let written = fields[9].parse::<u64>().unwrap_or(0);
        sectors_read += read;
        sectors_written += written;
        seen = true;
    }
    if !seen {
        return (None, None);
    }
    (
        Some(round1(sectors_read as f64 * SECTOR_SIZE as f64 / 1e6)),
        Some(round1(sectors_written as f64 * SECTOR_SIZE as f64 / 1e6)),
    )
}

#[cfg(not(target_os = "linux"))]
fn diskstats_io_totals() -> (Option<f64>, Option<f64>) {
    (None, None)
}

/// Whole physical devices only: partitions and virtual devices would double
/// count the sector totals.
#[cfg(target_os = "linux")]
fn is_physical_disk(name: &str) -> bool {
    for prefix in ["loop", "ram", "zram", "dm-", "md", "sr", "fd"] {
        if name.starts_with(prefix) {
            return false;
        }
    }
    if let Some(rest) = name
        .strip_prefix("sd")
        .or_else(|| name.strip_prefix("vd"))
        .or_else(|| name.strip_prefix("hd"))
    {
        // sda yes, sda1 no.
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphabetic());
    }
    if name.starts_with("nvme") || name.starts_with("mmcblk") {
        // nvme0n1 yes, nvme0n1p2 no.
        return !name.contains('p');
    }
    true
}

// =============================================================================
// Uptime
// =============================================================================

/// Collect uptime and boot time.
pub fn collect_uptime() -> SectionData<UptimeStats> {
    capture(uptime_stats())
}

fn uptime_stats() -> Result<UptimeStats, CollectError> {
    let seconds = System::uptime();
    let boot_time = DateTime::<Utc>::from_timestamp(System::boot_time() as i64, 0)
        .ok_or_else(|| CollectError::Unavailable("boot time out of range".to_string()))?;

    Ok(UptimeStats {
        uptime_seconds: seconds,
        uptime_human: humanize_uptime(seconds),
        boot_time,
    })
}

fn humanize_uptime(seconds: u64) -> String {
    format!(
        "{}d {:02}h {:02}m {:02}s",
        seconds / 86_400,
        (seconds % 86_400) / 3_600,
        (seconds % 3_600) / 60,
        seconds % 60
    )
}

// =============================================================================
// OS
// =============================================================================

/// Collect operating system identification.
pub fn collect_os() -> SectionData<OsStats> {
    capture(os_stats())
}

fn os_stats() -> Result<OsStats, CollectError> {
    let (distro_name, distro_version) = os_release_fields();

    Ok(OsStats {
        system: System::name(),
        kernel: System::kernel_version(),
        architecture: System::cpu_arch(),
        hostname: SystemSampler::hostname(),
        distro_name,
        distro_version,
    })
}

/// PRETTY_NAME and VERSION_ID from /etc/os-release, when present.
fn os_release_fields() -> (Option<String>, Option<String>) {
    let content = match std::fs::read_to_string("/etc/os-release") {
        Ok(content) => content,
        Err(_) => return (None, None),
    };
    let mut name = None;
    let mut version = None;
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("PRETTY_NAME=") {
            name = Some(value.trim().trim_matches('"').to_string());
        } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
            version = Some(value.trim().trim_matches('"').to_string());
        }
    }
    (name, version)
}
