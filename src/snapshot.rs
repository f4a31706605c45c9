//! Snapshot data model.
//!
//! A [`Snapshot`] is one complete, timestamped set of collected metric
//! sections. Sections are a fixed enumerated set ([`Section`]); each carries
//! a typed payload wrapped in [`SectionData`], whose `Failed` variant is the
//! per-section error contract: a collector failure surfaces as
//! `{"error": "..."}` inside an otherwise valid snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

// =============================================================================
// Rounding
// =============================================================================

/// Round to one decimal (percentages, temperatures, MB totals).
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Round to two decimals (gigabyte-scale sizes, process percentages).
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Round to three decimals (megabit-per-second speeds).
pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Bytes to gigabytes, two decimals.
pub fn gb(bytes: u64) -> f64 {
    round2(bytes as f64 / 1e9)
}

/// Bytes to megabytes, one decimal.
pub fn mb(bytes: u64) -> f64 {
    round1(bytes as f64 / 1e6)
}

// =============================================================================
// Sections
// =============================================================================

/// The fixed set of metric sections a snapshot can carry.
///
/// The lowercase name of each variant is both the JSON field name inside the
/// snapshot and the path segment accepted by `GET /api/stats/{section}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Section {
    Cpu,
    Ram,
    Disk,
    Network,
    Temperature,
    Uptime,
    Os,
    Hardware,
    Processes,
    Users,
    Battery,
    Gpu,
}

/// Error payload for a section whose collector failed internally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionError {
    pub error: String,
}

/// A section payload: either the collected stats or an error marker.
///
/// Serialized untagged, so `Collected` writes the payload fields directly
/// and `Failed` writes `{"error": "..."}`. `Failed` is listed first so that
/// error payloads deserialize unambiguously (every payload type lacks an
/// `error` field).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionData<T> {
    Failed(SectionError),
    Collected(T),
}

impl<T> SectionData<T> {
    /// Wrap an error message as a failed section.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(SectionError {
            error: message.into(),
        })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The collected payload, if collection succeeded.
    pub fn collected(&self) -> Option<&T> {
        match self {
            Self::Collected(t) => Some(t),
            Self::Failed(_) => None,
        }
    }
}

// =============================================================================
// Section payloads
// =============================================================================

/// CPU load, topology and frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub percent: f64,
    pub percent_per_core: Vec<f64>,
    pub cores_logical: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores_physical: Option<usize>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq_mhz_current: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq_mhz_max: Option<f64>,
}

/// Memory and swap usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RamStats {
    pub percent: f64,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub swap_total_gb: f64,
    pub swap_used_gb: f64,
    pub swap_percent: f64,
}

/// One mounted partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub percent: f64,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
}

/// Disk usage per partition plus cumulative I/O counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskStats {
    pub partitions: Vec<PartitionStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_read_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_write_mb: Option<f64>,
}

/// One network interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub name: String,
    pub mac: String,
    pub addresses: Vec<String>,
}

/// Network throughput, totals and interfaces.
///
/// The speed fields are present only when speed sampling was enabled for the
/// cycle; they cover a dedicated one-second window measured inside the cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_up_mbps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_dn_mbps: Option<f64>,
    pub sent_total_mb: f64,
    pub recv_total_mb: f64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errors_in: u64,
    pub errors_out: u64,
    pub interfaces: Vec<InterfaceStats>,
}

/// One temperature sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub label: String,
    pub current: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<f64>,
}

/// Temperature sensors, or a note when none are detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureStats {
    #[serde(default)]
    pub sensors: Vec<SensorReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Uptime and boot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UptimeStats {
    pub uptime_seconds: u64,
    pub uptime_human: String,
    pub boot_time: DateTime<Utc>,
}

/// Operating system identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distro_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distro_version: Option<String>,
}

/// Hardware inventory from DMI and, on Raspberry Pi, /proc/cpuinfo.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HardwareStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bios_vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bios_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chassis_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpi_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpi_serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpi_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl HardwareStats {
    /// True when no DMI or Raspberry Pi field could be read.
    pub fn is_empty(&self) -> bool {
        self.manufacturer.is_none()
            && self.product_name.is_none()
            && self.serial_number.is_none()
            && self.uuid.is_none()
            && self.bios_vendor.is_none()
            && self.bios_version.is_none()
            && self.chassis_type.is_none()
            && self.rpi_model.is_none()
            && self.rpi_serial.is_none()
            && self.rpi_revision.is_none()
    }
}

/// One process row in the top-CPU / top-memory lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub status: String,
}

/// Process counts plus the heaviest consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStats {
    pub total: usize,
    pub running: usize,
    pub top_cpu: Vec<ProcessEntry>,
    pub top_mem: Vec<ProcessEntry>,
}

/// One logged-in session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
}

/// Logged-in users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub logged_in: Vec<SessionEntry>,
    pub count: usize,
}

/// Battery charge state; `present: false` on hosts without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryStats {
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugged_in: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// One GPU as reported by its query tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub util_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_used_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_total_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_celsius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_mem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttled: Option<String>,
    pub driver: String,
}

/// GPUs found via nvidia-smi or vcgencmd.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuStats {
    pub gpus: Vec<GpuEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// =============================================================================
// Snapshot
// =============================================================================

/// One complete collection result: identity fields plus the enabled sections.
///
/// Sections disabled in configuration are `None` and omitted from the JSON
/// document entirely. A snapshot is immutable once assembled; the
/// orchestrator never touches it after handing it to the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub atlas_version: String,
    pub collected_at: DateTime<Utc>,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<SectionData<CpuStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<SectionData<RamStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<SectionData<DiskStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<SectionData<NetworkStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<SectionData<TemperatureStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<SectionData<UptimeStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<SectionData<OsStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware: Option<SectionData<HardwareStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processes: Option<SectionData<ProcessStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<SectionData<UserStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<SectionData<BatteryStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<SectionData<GpuStats>>,
}

impl Snapshot {
    /// An empty snapshot stamped with the current time and crate version.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            atlas_version: env!("CARGO_PKG_VERSION").to_string(),
            collected_at: Utc::now(),
            hostname: hostname.into(),
            cpu: None,
            ram: None,
            disk: None,
            network: None,
            temperature: None,
            uptime: None,
            os: None,
            hardware: None,
            processes: None,
            users: None,
            battery: None,
            gpu: None,
        }
    }

    /// Sections actually present in this snapshot, in declaration order.
    pub fn available_sections(&self) -> Vec<Section> {
        Section::iter()
            .filter(|s| self.section_present(*s))
            .collect()
    }

    fn section_present(&self, section: Section) -> bool {
        match section {
            Section::Cpu => self.cpu.is_some(),
            Section::Ram => self.ram.is_some(),
            Section::Disk => self.disk.is_some(),
            Section::Network => self.network.is_some(),
            Section::Temperature => self.temperature.is_some(),
            Section::Uptime => self.uptime.is_some(),
            Section::Os => self.os.is_some(),
            Section::Hardware => self.hardware.is_some(),
            Section::Processes => self.processes.is_some(),
            Section::Users => self.users.is_some(),
            Section::Battery => self.battery.is_some(),
            Section::Gpu => self.gpu.is_some(),
        }
    }

    /// Serialize one section's payload to a JSON value, if present.
    pub fn section_value(&self, section: Section) -> Option<serde_json::Value> {
        fn val<T: Serialize>(data: &Option<SectionData<T>>) -> Option<serde_json::Value> {
            data.as_ref().and_then(|d| serde_json::to_value(d).ok())
        }
        match section {
            Section::Cpu => val(&self.cpu),
            Section::Ram => val(&self.ram),
            Section::Disk => val(&self.disk),
            Section::Network => val(&self.network),
            Section::Temperature => val(&self.temperature),
            Section::Uptime => val(&self.uptime),
            Section::Os => val(&self.os),
            Section::Hardware => val(&self.hardware),
            Section::Processes => val(&self.processes),
            Section::Users => val(&self.users),
            Section::Battery => val(&self.battery),
            Section::Gpu => val(&self.gpu),
        }
    }

    /// Overall CPU load, when the cpu section collected successfully.
    pub fn cpu_percent(&self) -> Option<f64> {
        self.cpu
            .as_ref()
            .and_then(|d| d.collected())
            .map(|c| c.percent)
    }

    /// Memory usage percentage, when collected.
    pub fn ram_percent(&self) -> Option<f64> {
        self.ram
            .as_ref()
            .and_then(|d| d.collected())
            .map(|r| r.percent)
    }

    /// Usage of the first partition, the disk summary figure for history rows.
    pub fn disk_percent(&self) -> Option<f64> {
        self.disk
            .as_ref()
            .and_then(|d| d.collected())
            .and_then(|d| d.partitions.first())
            .map(|p| p.percent)
    }
}
