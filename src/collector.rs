//! Metric collector set.
//!
//! One collector per section, each a plain function over ambient system
//! state. Collectors never fail past their own boundary: internal errors
//! are converted into the section's `{"error": ...}` payload, and collectors
//! that shell out to external tools run them through
//! [`command::run_with_timeout`] so a hung or missing binary degrades to a
//! non-fatal empty result. No collector depends on another.

pub mod command;
mod inventory;
mod network;
mod process;
mod sensors;
mod system;

pub use inventory::{collect_gpu, collect_hardware};
pub use network::{collect_network, SPEED_SAMPLE_WINDOW};
pub use process::{collect_processes, collect_users};
pub use sensors::{collect_battery, collect_temperature};
pub use system::{collect_cpu, collect_disk, collect_os, collect_ram, collect_uptime};

use sysinfo::{Disks, Networks, System};
use thiserror::Error;

use crate::snapshot::SectionData;

/// Internal collector failure, converted to an error payload at the boundary.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The metric source is missing or reported nothing usable.
    #[error("{0}")]
    Unavailable(String),

    /// Reading a system file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An external probe tool failed.
    #[error("{0}")]
    Command(#[from] command::CommandError),
}

/// Convert a collector's internal result into its section payload.
pub(crate) fn capture<T>(result: Result<T, CollectError>) -> SectionData<T> {
    match result {
        Ok(stats) => SectionData::Collected(stats),
        Err(e) => {
            tracing::debug!(error = %e, "Collector failed");
            SectionData::failed(e.to_string())
        }
    }
}

/// Reusable sysinfo state shared by the per-cycle collectors.
///
/// CPU usage and network speed are delta measurements, so the underlying
/// `System` and `Networks` handles live across cycles instead of being
/// rebuilt each time.
pub struct SystemSampler {
    pub(crate) sys: System,
    pub(crate) networks: Networks,
    pub(crate) disks: Disks,
}

impl std::fmt::Debug for SystemSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSampler").finish_non_exhaustive()
    }
}

impl SystemSampler {
    /// Initialize the sampler, priming the CPU usage baseline.
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        // Two spaced refreshes so the first cycle reports a real CPU delta.
        sys.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();

        Self {
            sys,
            networks: Networks::new_with_refreshed_list(),
            disks: Disks::new_with_refreshed_list(),
        }
    }

    /// Hostname as reported by the kernel.
    pub fn hostname() -> String {
        System::host_name().unwrap_or_else(|| "unknown".to_string())
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}
