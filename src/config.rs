//! Configuration loading and first-run initialization.
//!
//! The configuration is a flat JSON document (`config/atlas.json` under the
//! base directory) merged on top of built-in defaults. Unknown keys are
//! preserved across load/save, a missing file falls back entirely to
//! defaults, and a corrupt file is logged and ignored rather than aborting
//! the process. On first run a fresh API key is generated and the full
//! default document is persisted.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snapshot::Section;

/// Default collection interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

/// Default history retention window in days.
pub const DEFAULT_KEEP_DAYS: u32 = 7;

/// Default API listen port.
pub const DEFAULT_API_PORT: u16 = 19890;

/// Length of the random part of a generated API key.
const API_KEY_LEN: usize = 44;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write the configuration file.
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize the configuration document.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

// =============================================================================
// Paths
// =============================================================================

/// Locations of the three state files under the base directory.
///
/// Layout mirrors the deployed tree: `config/atlas.json`, `cache/stats.json`,
/// `data/atlas.db`.
#[derive(Debug, Clone)]
pub struct BaseDirs {
    base: PathBuf,
}

impl BaseDirs {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config").join("atlas.json")
    }

    pub fn cache_file(&self) -> PathBuf {
        self.base.join("cache").join("stats.json")
    }

    pub fn db_file(&self) -> PathBuf {
        self.base.join("data").join("atlas.db")
    }

    /// Create the config/cache/data subdirectories if absent.
    pub fn ensure(&self) -> Result<(), std::io::Error> {
        for sub in ["config", "cache", "data"] {
            std::fs::create_dir_all(self.base.join(sub))?;
        }
        Ok(())
    }
}

// =============================================================================
// API engine selection
// =============================================================================

/// Which transport engine serves the read API.
///
/// Both engines expose identical routes, auth and response semantics; `Off`
/// starts no listener at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiEngine {
    #[default]
    Axum,
    Rocket,
    Off,
}

impl std::fmt::Display for ApiEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Axum => write!(f, "axum"),
            Self::Rocket => write!(f, "rocket"),
            Self::Off => write!(f, "off"),
        }
    }
}

// =============================================================================
// Configuration document
// =============================================================================

/// The recognized configuration options, with defaults matching a minimal
/// CPU/RAM/disk-only deployment. Everything else is opt-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    // On by default.
    pub collect_cpu: bool,
    pub collect_ram: bool,
    pub collect_disk: bool,
    // Off by default; each flag costs collection time per cycle.
    pub collect_network: bool,
    pub collect_temp: bool,
    pub collect_uptime: bool,
    pub collect_os: bool,
    pub collect_hardware: bool,
    pub collect_processes: bool,
    pub collect_users: bool,
    pub collect_battery: bool,
    pub collect_gpu: bool,
    /// Sample live throughput; trades one second of cycle time.
    pub net_speed_enabled: bool,
    /// Seconds between cycle starts.
    pub interval: u64,
    pub history_enabled: bool,
    pub history_keep_days: u32,
    pub api_engine: ApiEngine,
    pub api_port: u16,
    /// Shared secret; empty means every request is authorized.
    pub api_key: String,
    pub api_enabled: bool,
    /// Unrecognized keys, preserved verbatim across load/save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            collect_cpu: true,
            collect_ram: true,
            collect_disk: true,
            collect_network: false,
            collect_temp: false,
            collect_uptime: false,
            collect_os: false,
            collect_hardware: false,
            collect_processes: false,
            collect_users: false,
            collect_battery: false,
            collect_gpu: false,
            net_speed_enabled: true,
            interval: DEFAULT_INTERVAL_SECS,
            history_enabled: false,
            history_keep_days: DEFAULT_KEEP_DAYS,
            api_engine: ApiEngine::default(),
            api_port: DEFAULT_API_PORT,
            api_key: String::new(),
            api_enabled: true,
            extra: serde_json::Map::new(),
        }
    }
}

impl AtlasConfig {
    /// Load the configuration, merging the file over defaults.
    ///
    /// A missing file yields the defaults; an unreadable or unparsable file
    /// logs a warning and also yields the defaults. Never fails.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Config parse error, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Config read error, using defaults");
                Self::default()
            }
        }
    }

    /// Create the configuration file on first run, then load it.
    ///
    /// The generated document carries a fresh API key so the API is never
    /// silently open unless the operator empties the key on purpose.
    pub fn init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let mut config = Self::default();
            config.api_key = generate_api_key();
            config.save(path)?;
            tracing::info!(path = %path.display(), "Config created");
            tracing::info!(api_key = %config.api_key, "Generated API key");
        }
        Ok(Self::load(path))
    }

    /// Persist the configuration, pretty-printed, preserving unknown keys.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        let body = serde_json::to_string_pretty(self)?;
        file.write_all(body.as_bytes())?;
        Ok(())
    }

    /// Whether a given section's collector is enabled.
    pub fn section_enabled(&self, section: Section) -> bool {
        match section {
            Section::Cpu => self.collect_cpu,
            Section::Ram => self.collect_ram,
            Section::Disk => self.collect_disk,
            Section::Network => self.collect_network,
            Section::Temperature => self.collect_temp,
            Section::Uptime => self.collect_uptime,
            Section::Os => self.collect_os,
            Section::Hardware => self.collect_hardware,
            Section::Processes => self.collect_processes,
            Section::Users => self.collect_users,
            Section::Battery => self.collect_battery,
            Section::Gpu => self.collect_gpu,
        }
    }

    /// The enabled sections in snapshot order.
    pub fn enabled_sections(&self) -> Vec<Section> {
        use strum::IntoEnumIterator;
        Section::iter()
            .filter(|s| self.section_enabled(*s))
            .collect()
    }

    /// The cycle interval, clamped to at least one second.
    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }

    /// The retention window, clamped to at least one day.
    pub fn keep_days(&self) -> u32 {
        self.history_keep_days.max(1)
    }

    /// Validate the keys the API process depends on.
    ///
    /// Startup-fatal for the API process only; the collector never consults
    /// these fields.
    pub fn validate_api(&self) -> Result<(), String> {
        if self.api_port == 0 {
            return Err("api_port must be non-zero".to_string());
        }
        Ok(())
    }
}

/// Generate a fresh API key: `atl_` plus 44 random alphanumerics.
pub fn generate_api_key() -> String {
    format!(
        "atl_{}",
        Alphanumeric.sample_string(&mut rand::rng(), API_KEY_LEN)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AtlasConfig::default();
        assert!(config.collect_cpu);
        assert!(config.collect_ram);
        assert!(config.collect_disk);
        assert!(!config.collect_network);
        assert!(!config.collect_gpu);
        assert!(config.net_speed_enabled);
        assert_eq!(config.interval, 30);
        assert!(!config.history_enabled);
        assert_eq!(config.history_keep_days, 7);
        assert_eq!(config.api_engine, ApiEngine::Axum);
        assert_eq!(config.api_port, 19890);
        assert!(config.api_key.is_empty());
        assert!(config.api_enabled);
    }

    #[test]
    fn test_default_enabled_sections() {
        let config = AtlasConfig::default();
        assert_eq!(
            config.enabled_sections(),
            vec![Section::Cpu, Section::Ram, Section::Disk]
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = AtlasConfig::load(&dir.path().join("nope.json"));
        assert_eq!(config.interval, 30);
    }

    #[test]
    fn test_load_corrupt_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atlas.json");
        std::fs::write(&path, "{not json").unwrap();
        let config = AtlasConfig::load(&path);
        assert_eq!(config.interval, 30);
        assert!(config.collect_cpu);
    }

    #[test]
    fn test_partial_file_merges_over_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atlas.json");
        std::fs::write(&path, r#"{"interval": 5, "collect_gpu": true}"#).unwrap();
        let config = AtlasConfig::load(&path);
        assert_eq!(config.interval, 5);
        assert!(config.collect_gpu);
        // Untouched keys keep their defaults.
        assert!(config.collect_cpu);
        assert_eq!(config.api_port, 19890);
    }

    #[test]
    fn test_unknown_keys_survive_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atlas.json");
        std::fs::write(
            &path,
            r#"{"interval": 10, "future_option": {"nested": true}}"#,
        )
        .unwrap();
        let config = AtlasConfig::load(&path);
        assert_eq!(
            config.extra.get("future_option"),
            Some(&serde_json::json!({"nested": true}))
        );
        config.save(&path).unwrap();

        let reloaded = AtlasConfig::load(&path);
        assert_eq!(reloaded.interval, 10);
        assert!(reloaded.extra.contains_key("future_option"));
    }

    #[test]
    fn test_init_generates_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config").join("atlas.json");
        let config = AtlasConfig::init(&path).unwrap();
        assert!(config.api_key.starts_with("atl_"));
        assert_eq!(config.api_key.len(), 4 + 44);

        // A second init must not rotate the key.
        let again = AtlasConfig::init(&path).unwrap();
        assert_eq!(again.api_key, config.api_key);
    }

    #[test]
    fn test_interval_clamp() {
        let config = AtlasConfig {
            interval: 0,
            ..Default::default()
        };
        assert_eq!(config.interval_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_validate_api_port() {
        let config = AtlasConfig {
            api_port: 0,
            ..Default::default()
        };
        assert!(config.validate_api().is_err());
        assert!(AtlasConfig::default().validate_api().is_ok());
    }

    #[test]
    fn test_base_dirs_layout() {
        let dirs = BaseDirs::new("/opt/atlas");
        assert_eq!(
            dirs.config_file(),
            PathBuf::from("/opt/atlas/config/atlas.json")
        );
        assert_eq!(
            dirs.cache_file(),
            PathBuf::from("/opt/atlas/cache/stats.json")
        );
        assert_eq!(dirs.db_file(), PathBuf::from("/opt/atlas/data/atlas.db"));
    }
}
