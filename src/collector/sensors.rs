//! Sensor collectors: temperature and battery.

use sysinfo::Components;

use super::{capture, CollectError};
use crate::snapshot::{round1, BatteryStats, SectionData, SensorReading, TemperatureStats};

// =============================================================================
// Temperature
// =============================================================================

/// Collect temperature readings from hardware sensors.
pub fn collect_temperature() -> SectionData<TemperatureStats> {
    capture(temperature_stats())
}

fn temperature_stats() -> Result<TemperatureStats, CollectError> {
    let components = Components::new_with_refreshed_list();
    let mut sensors: Vec<SensorReading> = components
        .iter()
        .filter(|c| c.temperature().is_finite())
        .map(|c| SensorReading {
            label: c.label().to_string(),
            current: round1(c.temperature() as f64),
            high: Some(c.max())
                .filter(|m| m.is_finite() && *m > 0.0)
                .map(|m| round1(m as f64)),
            critical: c
                .critical()
                .filter(|m| m.is_finite())
                .map(|m| round1(m as f64)),
        })
        .collect();

    if sensors.is_empty() {
        sensors = thermal_zone_readings();
    }

    if sensors.is_empty() {
        return Ok(TemperatureStats {
            sensors,
            note: Some("No sensors detected".to_string()),
        });
    }
    Ok(TemperatureStats {
        sensors,
        note: None,
    })
}

/// Fallback for boards (notably Raspberry Pi) where no hwmon component shows
/// up: walk /sys/class/thermal directly.
#[cfg(target_os = "linux")]
fn thermal_zone_readings() -> Vec<SensorReading> {
    let mut readings = Vec::new();
    let entries = match std::fs::read_dir("/sys/class/thermal") {
        Ok(entries) => entries,
        Err(_) => return readings,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let raw = match std::fs::read_to_string(path.join("temp")) {
            Ok(raw) => raw,
            Err(_) => continue,
        };
        let Ok(millidegrees) = raw.trim().parse::<f64>() else {
            continue;
        };
        let label = std::fs::read_to_string(path.join("type"))
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|_| entry.file_name().to_string_lossy().to_string());
        readings.push(SensorReading {
            label,
            current: round1(millidegrees / 1000.0),
            high: None,
            critical: None,
        });
    }
    readings
}

#[cfg(not(target_os = "linux"))]
fn thermal_zone_readings() -> Vec<SensorReading> {
    Vec::new()
}

// =============================================================================
// Battery
// =============================================================================

/// Collect battery state; hosts without a battery report `present: false`.
pub fn collect_battery() -> SectionData<BatteryStats> {
    capture(battery_stats())
}

#[cfg(target_os = "linux")]
fn battery_stats() -> Result<BatteryStats, CollectError> {
    let entries = match std::fs::read_dir("/sys/class/power_supply") {
        Ok(entries) => entries,
        Err(_) => return Ok(BatteryStats::absent()),
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with("BAT") {
            continue;
        }
        let path = entry.path();
        let percent = std::fs::read_to_string(path.join("capacity"))
            .ok()
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .map(round1);
        let status = std::fs::read_to_string(path.join("status"))
            .ok()
            .map(|raw| raw.trim().to_string());
        let plugged_in = status
            .as_deref()
            .map(|s| matches!(s, "Charging" | "Full" | "Not charging"));

        return Ok(BatteryStats {
            present: true,
            percent,
            plugged_in,
            status,
        });
    }
    Ok(BatteryStats::absent())
}

#[cfg(not(target_os = "linux"))]
fn battery_stats() -> Result<BatteryStats, CollectError> {
    Ok(BatteryStats::absent())
}

impl BatteryStats {
    fn absent() -> Self {
        Self {
            present: false,
            percent: None,
            plugged_in: None,
            status: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_collects_readings_or_note() {
        let stats = collect_temperature();
        let stats = stats
            .collected()
            .expect("temperature collection should succeed");
        if stats.sensors.is_empty() {
            assert_eq!(stats.note.as_deref(), Some("No sensors detected"));
        } else {
            assert!(stats.note.is_none());
            for reading in &stats.sensors {
                assert!(!reading.label.is_empty());
            }
        }
    }

    #[test]
    fn test_battery_collects() {
        let stats = collect_battery();
        let stats = stats.collected().expect("battery collection should succeed");
        if !stats.present {
            assert!(stats.percent.is_none());
            assert!(stats.status.is_none());
        }
    }
}
