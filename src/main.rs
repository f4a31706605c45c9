//! ATLAS binary entry point.
//!
//! Three subcommands map to the three roles of the system: `collect` runs
//! the orchestrator loop, `api` serves the read API, and `stats` renders the
//! terminal dashboard. The collector and the API are meant to run as
//! separate processes sharing only the base directory.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crossterm::tty::IsTty;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atlas::api::{self, ApiContext};
use atlas::config::{ApiEngine, AtlasConfig, BaseDirs};
use atlas::snapshot::Section;
use atlas::{dashboard, Orchestrator, SnapshotCache};

/// ATLAS - lightweight host telemetry
#[derive(Parser, Debug)]
#[command(name = "atlas", version, about, long_about = None)]
struct Cli {
    /// Base directory holding config, cache and data
    #[arg(
        long,
        global = true,
        default_value = "/opt/atlas",
        env = "ATLAS_BASE_DIR"
    )]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the metric collector loop
    Collect {
        /// Perform exactly one cycle, then exit
        #[arg(long)]
        once: bool,

        /// Override the configured interval (seconds)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Serve the read API
    Api {
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,

        /// Override the configured transport engine
        #[arg(long, value_enum)]
        engine: Option<ApiEngine>,
    },

    /// Render the cached snapshot as a terminal dashboard
    Stats {
        /// Refresh continuously
        #[arg(long)]
        watch: bool,

        /// Refresh interval for --watch (seconds)
        #[arg(long, default_value_t = 30)]
        interval: u64,

        /// Show one section only (cpu, ram, disk, ...)
        #[arg(long)]
        section: Option<String>,

        /// Dump raw JSON instead of rendering
        #[arg(long)]
        json: bool,

        /// Read this cache file instead of the default
        #[arg(long)]
        cache: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,atlas=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let dirs = BaseDirs::new(&cli.base_dir);

    let result = match cli.command {
        Command::Collect { once, interval } => run_collect(&dirs, once, interval),
        Command::Api { port, engine } => run_api(&dirs, port, engine),
        Command::Stats {
            watch,
            interval,
            section,
            json,
            cache,
        } => run_stats(&dirs, watch, interval, section.as_deref(), json, cache),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal");
            ExitCode::FAILURE
        }
    }
}

/// The orchestrator process. Only startup catastrophes (unwritable base
/// directory, unwritable first-run config) are fatal; every steady-state
/// error is recovered per cycle.
fn run_collect(
    dirs: &BaseDirs,
    once: bool,
    interval: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    dirs.ensure()?;
    let mut config = AtlasConfig::init(&dirs.config_file())?;
    if let Some(secs) = interval {
        config.interval = secs;
    }

    let cache = SnapshotCache::new(dirs.cache_file());
    let mut orchestrator = Orchestrator::new(config, cache, dirs.db_file());

    if once {
        orchestrator.run_cycle();
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown requested, finishing in-flight cycle");
        flag.store(true, Ordering::Relaxed);
    })?;

    orchestrator.run(&shutdown);
    Ok(())
}

/// The API process. Invalid listen configuration or a bind failure aborts
/// before serving; a disabled API exits 0 immediately.
fn run_api(
    dirs: &BaseDirs,
    port: Option<u16>,
    engine: Option<ApiEngine>,
) -> Result<(), Box<dyn Error>> {
    let mut config = AtlasConfig::load(&dirs.config_file());
    if let Some(port) = port {
        config.api_port = port;
    }
    if let Some(engine) = engine {
        config.api_engine = engine;
    }

    let ctx = ApiContext::new(
        SnapshotCache::new(dirs.cache_file()),
        dirs.db_file(),
        config.api_key.clone(),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(api::serve(&config, ctx))?;
    Ok(())
}

/// The presentation process: reads the cache, renders, optionally loops.
fn run_stats(
    dirs: &BaseDirs,
    watch: bool,
    interval: u64,
    section: Option<&str>,
    json: bool,
    cache_path: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let cache = SnapshotCache::new(cache_path.unwrap_or_else(|| dirs.cache_file()));
    let color = std::io::stdout().is_tty();

    loop {
        match cache.read() {
            None => {
                eprintln!("No cache found at {}", cache.path().display());
                eprintln!("Start the collector: atlas collect");
                if !watch {
                    return Err("cache not found".into());
                }
            }
            Some(snapshot) => {
                if watch {
                    // Clear screen and home the cursor between refreshes.
                    print!("\x1b[2J\x1b[H");
                }
                print_snapshot(&snapshot, section, json, color)?;
            }
        }

        if !watch {
            return Ok(());
        }
        std::thread::sleep(Duration::from_secs(interval.max(1)));
    }
}

fn print_snapshot(
    snapshot: &atlas::Snapshot,
    section: Option<&str>,
    json: bool,
    color: bool,
) -> Result<(), Box<dyn Error>> {
    let Some(name) = section else {
        if json {
            println!("{}", serde_json::to_string_pretty(snapshot)?);
        } else {
            print!("{}", dashboard::render(snapshot, color));
        }
        return Ok(());
    };

    let available = || {
        snapshot
            .available_sections()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let Ok(parsed) = Section::from_str(name) else {
        eprintln!("Unknown section '{name}'. Available: {}", available());
        return Err("unknown section".into());
    };

    if json {
        match snapshot.section_value(parsed) {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => {
                eprintln!("Section '{name}' not collected. Available: {}", available());
                return Err("section not collected".into());
            }
        }
        return Ok(());
    }

    match dashboard::render_section(snapshot, parsed, color) {
        Some(block) => println!("{block}"),
        None => {
            eprintln!("Section '{name}' not collected. Available: {}", available());
            return Err("section not collected".into());
        }
    }
    Ok(())
}
