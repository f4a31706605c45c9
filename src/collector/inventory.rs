//! Inventory collectors that shell out: DMI hardware identity and GPUs.

use std::time::Duration;

use super::command::{run_with_timeout, CommandError};
use super::{capture, CollectError};
use crate::snapshot::{GpuEntry, GpuStats, HardwareStats, SectionData};

/// Budget per dmidecode/vcgencmd invocation.
const DMI_TIMEOUT: Duration = Duration::from_secs(3);

/// nvidia-smi can be slow on first wake of the driver.
const NVIDIA_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Hardware
// =============================================================================

/// Collect hardware identity from DMI and, on Raspberry Pi, /proc/cpuinfo.
pub fn collect_hardware() -> SectionData<HardwareStats> {
    capture(hardware_stats())
}

fn hardware_stats() -> Result<HardwareStats, CollectError> {
    let mut hw = HardwareStats {
        manufacturer: dmi_field("system-manufacturer"),
        product_name: dmi_field("system-product-name"),
        serial_number: dmi_field("system-serial-number"),
        uuid: dmi_field("system-uuid"),
        bios_vendor: dmi_field("bios-vendor"),
        bios_version: dmi_field("bios-version"),
        chassis_type: dmi_field("chassis-type"),
        ..HardwareStats::default()
    };

    apply_rpi_cpuinfo(&mut hw);

    if hw.is_empty() {
        hw.note = Some("Limited — dmidecode may need sudo".to_string());
    }
    Ok(hw)
}

/// One `dmidecode -s` value; any failure (missing tool, no privilege,
/// timeout, placeholder value) reads as absent.
fn dmi_field(keyword: &str) -> Option<String> {
    let output = run_with_timeout("dmidecode", &["-s", keyword], DMI_TIMEOUT).ok()?;
    let value = output.trim();
    if value.is_empty() || value.to_lowercase().contains("not present") {
        return None;
    }
    Some(value.to_string())
}

/// Raspberry Pi boards expose their identity in /proc/cpuinfo instead of DMI.
fn apply_rpi_cpuinfo(hw: &mut HardwareStats) {
    let Ok(content) = std::fs::read_to_string("/proc/cpuinfo") else {
        return;
    };
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "Model" => hw.rpi_model = Some(value),
            "Serial" => hw.rpi_serial = Some(value),
            "Revision" => hw.rpi_revision = Some(value),
            _ => {}
        }
    }
}

// =============================================================================
// GPU
// =============================================================================

/// Collect GPU inventory via nvidia-smi, falling back to vcgencmd.
pub fn collect_gpu() -> SectionData<GpuStats> {
    capture(gpu_stats())
}

fn gpu_stats() -> Result<GpuStats, CollectError> {
    match nvidia_gpus() {
        Ok(gpus) if !gpus.is_empty() => return Ok(GpuStats { gpus, note: None }),
        Ok(_) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => {
            tracing::debug!(error = %e, "nvidia-smi probe failed");
        }
    }

    match videocore_gpu() {
        Ok(Some(entry)) => {
            return Ok(GpuStats {
                gpus: vec![entry],
                note: None,
            })
        }
        Ok(None) => {
            return Ok(GpuStats {
                gpus: Vec::new(),
                note: Some("No GPU detected".to_string()),
            })
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => {
            tracing::debug!(error = %e, "vcgencmd probe failed");
        }
    }

    Ok(GpuStats {
        gpus: Vec::new(),
        note: Some("No GPU tools found".to_string()),
    })
}

/// Query NVIDIA GPUs as headerless CSV.
fn nvidia_gpus() -> Result<Vec<GpuEntry>, CommandError> {
    let output = run_with_timeout(
        "nvidia-smi",
        &[
            "--query-gpu=name,utilization.gpu,memory.used,memory.total,temperature.gpu",
            "--format=csv,noheader,nounits",
        ],
        NVIDIA_TIMEOUT,
    )?;

    let gpus = output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() < 5 {
                return None;
            }
            Some(GpuEntry {
                name: fields[0].to_string(),
                util_percent: fields[1].parse().ok(),
                mem_used_mb: fields[2].parse().ok(),
                mem_total_mb: fields[3].parse().ok(),
                temp_celsius: fields[4].parse().ok(),
                gpu_mem: None,
                throttled: None,
                driver: "nvidia".to_string(),
            })
        })
        .collect();
    Ok(gpus)
}

/// Query the Raspberry Pi VideoCore GPU.
fn videocore_gpu() -> Result<Option<GpuEntry>, CommandError> {
    let mem = run_with_timeout("vcgencmd", &["get_mem", "gpu"], DMI_TIMEOUT)?;
    let mem = mem.trim();
    if mem.is_empty() {
        return Ok(None);
    }

    let throttled = run_with_timeout("vcgencmd", &["get_throttled"], DMI_TIMEOUT)
        .ok()
        .map(|out| out.trim().to_string());

    Ok(Some(GpuEntry {
        name: "VideoCore (RPi)".to_string(),
        util_percent: None,
        mem_used_mb: None,
        mem_total_mb: None,
        temp_celsius: None,
        gpu_mem: Some(mem.to_string()),
        throttled,
        driver: "videocore".to_string(),
    }))
}
