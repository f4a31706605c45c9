//! Collection orchestrator.
//!
//! Runs the enabled collectors once per cycle, strictly sequentially,
//! assembles the snapshot, and drives persistence. A collector failure is
//! confined to its own section payload; a persistence failure is logged and
//! retried unconditionally on the next cycle. The loop itself never exits on
//! a steady-state error.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::SnapshotCache;
use crate::collector::{self, SystemSampler};
use crate::config::AtlasConfig;
use crate::history::HistoryStore;
use crate::snapshot::Snapshot;

/// Granularity of the inter-cycle sleep, so shutdown is honored promptly
/// without abandoning an in-flight cycle.
const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

/// The per-cycle collection and persistence driver.
pub struct Orchestrator {
    config: AtlasConfig,
    sampler: SystemSampler,
    cache: SnapshotCache,
    db_path: PathBuf,
    /// Lazily (re)opened so a failed open is retried on the next cycle.
    history: Option<HistoryStore>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("cache", &self.cache.path())
            .field("db", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(config: AtlasConfig, cache: SnapshotCache, db_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            sampler: SystemSampler::new(),
            cache,
            db_path: db_path.into(),
            history: None,
        }
    }

    /// Run the enabled collectors and assemble one immutable snapshot.
    ///
    /// Collectors run in declaration order; each converts its own failures
    /// into an error payload, so one broken section never suppresses the
    /// others.
    pub fn collect_all(&mut self) -> Snapshot {
        let cfg = &self.config;
        let mut snapshot = Snapshot::new(SystemSampler::hostname());

        if cfg.collect_cpu {
            snapshot.cpu = Some(collector::collect_cpu(&mut self.sampler));
        }
        if cfg.collect_ram {
            snapshot.ram = Some(collector::collect_ram(&mut self.sampler));
        }
        if cfg.collect_disk {
            snapshot.disk = Some(collector::collect_disk(&mut self.sampler));
        }
        if cfg.collect_network {
            snapshot.network = Some(collector::collect_network(
                &mut self.sampler,
                cfg.net_speed_enabled,
            ));
        }
        if cfg.collect_temp {
            snapshot.temperature = Some(collector::collect_temperature());
        }
        if cfg.collect_uptime {
            snapshot.uptime = Some(collector::collect_uptime());
        }
        if cfg.collect_os {
            snapshot.os = Some(collector::collect_os());
        }
        if cfg.collect_hardware {
            snapshot.hardware = Some(collector::collect_hardware());
        }
        if cfg.collect_processes {
            snapshot.processes = Some(collector::collect_processes(&mut self.sampler));
        }
        if cfg.collect_users {
            snapshot.users = Some(collector::collect_users());
        }
        if cfg.collect_battery {
            snapshot.battery = Some(collector::collect_battery());
        }
        if cfg.collect_gpu {
            snapshot.gpu = Some(collector::collect_gpu());
        }

        snapshot
    }

    /// One full cycle: collect, cache, optionally append history.
    ///
    /// Persistence failures are logged and cleared; the next cycle retries
    /// with no backoff.
    pub fn run_cycle(&mut self) {
        let snapshot = self.collect_all();

        if let Err(e) = self.cache.write(&snapshot) {
            tracing::warn!(error = %e, "Cache write failed");
        }

        if self.config.history_enabled {
            self.append_history(&snapshot);
        }

        tracing::info!(
            cpu = snapshot.cpu_percent(),
            ram = snapshot.ram_percent(),
            disk = snapshot.disk_percent(),
            "Cycle complete"
        );
    }

    fn append_history(&mut self, snapshot: &Snapshot) {
        if self.history.is_none() {
            match HistoryStore::open(&self.db_path) {
                Ok(store) => self.history = Some(store),
                Err(e) => {
                    tracing::warn!(error = %e, "History open failed");
                    return;
                }
            }
        }
        if let Some(store) = &self.history {
            if let Err(e) = store.append(snapshot, self.config.keep_days()) {
                tracing::warn!(error = %e, "History append failed");
                // Drop the handle so the next cycle reopens from scratch.
                self.history = None;
            }
        }
    }

    /// Run cycles until the shutdown flag is raised.
    ///
    /// Cadence is measured cycle start to cycle start. When a cycle's own
    /// work exceeds the interval, the next one starts immediately; cycles
    /// are never queued, only delayed.
    pub fn run(&mut self, shutdown: &Arc<AtomicBool>) {
        let interval = self.config.interval_duration();
        let enabled: Vec<String> = self
            .config
            .enabled_sections()
            .iter()
            .map(|s| s.to_string())
            .collect();
        tracing::info!(
            collecting = %enabled.join(", "),
            interval_secs = interval.as_secs(),
            history = self.config.history_enabled,
            "Collector started"
        );

        while !shutdown.load(Ordering::Relaxed) {
            let start = Instant::now();
            self.run_cycle();

            let elapsed = start.elapsed();
            if elapsed > interval {
                tracing::debug!(?elapsed, "Cycle overran interval, starting next immediately");
                continue;
            }
            let mut remaining = interval - elapsed;
            while remaining > Duration::ZERO && !shutdown.load(Ordering::Relaxed) {
                let nap = remaining.min(SHUTDOWN_POLL);
                std::thread::sleep(nap);
                remaining = remaining.saturating_sub(nap);
            }
        }
        tracing::info!("Collector stopped");
    }
}
