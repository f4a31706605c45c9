//! Terminal dashboard.
//!
//! Renders a cached snapshot as a compact colored report. This layer only
//! consumes the snapshot cache read interface; it never talks to the
//! collectors or the history store. Colors are dropped when stdout is not a
//! terminal.

use chrono::Utc;
use crossterm::style::Stylize;

use crate::snapshot::{
    BatteryStats, CpuStats, DiskStats, GpuStats, HardwareStats, NetworkStats, OsStats,
    ProcessEntry, ProcessStats, RamStats, Section, SectionData, SensorReading, Snapshot,
    TemperatureStats, UptimeStats, UserStats,
};

/// Width of usage bars.
const BAR_WIDTH: usize = 24;

/// Usage fraction thresholds for bar coloring.
const WARN_PCT: f64 = 75.0;
const CRIT_PCT: f64 = 90.0;

/// Styling toggle; all rendering goes through these helpers so plain-text
/// output stays byte-identical minus the escape codes.
#[derive(Debug, Clone, Copy)]
struct Paint {
    on: bool,
}

impl Paint {
    fn dim(&self, s: &str) -> String {
        if self.on {
            s.dark_grey().to_string()
        } else {
            s.to_string()
        }
    }

    fn strong(&self, s: &str) -> String {
        if self.on {
            s.bold().to_string()
        } else {
            s.to_string()
        }
    }

    fn title(&self, s: &str) -> String {
        if self.on {
            format!("  {} {} {}", "┤".blue(), s.bold(), "├".blue())
        } else {
            format!("  ┤ {s} ├")
        }
    }

    /// Color a percentage by the usual green/yellow/red thresholds.
    fn pct(&self, pct: f64) -> String {
        let text = format!("{pct:5.1}%");
        if !self.on {
            return text;
        }
        if pct >= CRIT_PCT {
            text.red().bold().to_string()
        } else if pct >= WARN_PCT {
            text.yellow().bold().to_string()
        } else {
            text.green().bold().to_string()
        }
    }

    /// A `[████░░░░]` usage bar colored by the same thresholds.
    fn bar(&self, pct: f64) -> String {
        let clamped = pct.clamp(0.0, 100.0);
        let filled = ((clamped / 100.0) * BAR_WIDTH as f64) as usize;
        let full = "█".repeat(filled);
        let empty = "░".repeat(BAR_WIDTH - filled);
        if !self.on {
            return format!("[{full}{empty}]");
        }
        let full = if clamped >= CRIT_PCT {
            full.red().to_string()
        } else if clamped >= WARN_PCT {
            full.yellow().to_string()
        } else {
            full.green().to_string()
        };
        format!("[{full}{}]", empty.dark_grey())
    }
}

/// Render the whole snapshot.
pub fn render(snapshot: &Snapshot, color: bool) -> String {
    let paint = Paint { on: color };
    let mut out = String::new();

    render_header(&mut out, snapshot, paint);
    for section in snapshot.available_sections() {
        if let Some(block) = render_section(snapshot, section, color) {
            if !block.is_empty() {
                out.push('\n');
                out.push_str(&block);
            }
        }
    }
    out.push('\n');
    out
}

/// Render a single section block, if present in the snapshot.
pub fn render_section(snapshot: &Snapshot, section: Section, color: bool) -> Option<String> {
    let paint = Paint { on: color };
    let mut out = String::new();
    match section {
        Section::Cpu => render_cpu(&mut out, snapshot.cpu.as_ref()?, paint),
        Section::Ram => render_ram(&mut out, snapshot.ram.as_ref()?, paint),
        Section::Disk => render_disk(&mut out, snapshot.disk.as_ref()?, paint),
        Section::Network => render_network(&mut out, snapshot.network.as_ref()?, paint),
        Section::Temperature => {
            render_temperature(&mut out, snapshot.temperature.as_ref()?, paint)
        }
        Section::Uptime => render_uptime(&mut out, snapshot.uptime.as_ref()?, paint),
        Section::Os => render_os(&mut out, snapshot.os.as_ref()?, paint),
        Section::Hardware => render_hardware(&mut out, snapshot.hardware.as_ref()?, paint),
        Section::Processes => render_processes(&mut out, snapshot.processes.as_ref()?, paint),
        Section::Users => render_users(&mut out, snapshot.users.as_ref()?, paint),
        Section::Battery => render_battery(&mut out, snapshot.battery.as_ref()?, paint),
        Section::Gpu => render_gpu(&mut out, snapshot.gpu.as_ref()?, paint),
    }
    Some(out)
}

fn render_header(out: &mut String, snapshot: &Snapshot, paint: Paint) {
    let age = cache_age(snapshot);
    out.push('\n');
    out.push_str(&paint.dim(&"═".repeat(56)));
    out.push('\n');
    out.push_str(&format!(
        "  {}  {}  {}\n",
        paint.strong("⬡ ATLAS"),
        paint.dim(&format!("v{}", snapshot.atlas_version)),
        paint.strong(&snapshot.hostname.to_uppercase()),
    ));
    out.push_str(&format!("  {}\n", paint.dim(&format!("Cache: {age}"))));
    out.push_str(&paint.dim(&"═".repeat(56)));
    out.push('\n');
}

fn cache_age(snapshot: &Snapshot) -> String {
    let diff = (Utc::now() - snapshot.collected_at).num_seconds().max(0);
    if diff < 60 {
        format!("{diff}s ago")
    } else if diff < 3600 {
        format!("{}m ago", diff / 60)
    } else {
        format!("{}h ago", diff / 3600)
    }
}

/// Failed sections render their error message instead of data.
fn render_failure(out: &mut String, title: &str, error: &str, paint: Paint) {
    out.push_str(&paint.title(title));
    out.push('\n');
    out.push_str(&format!("    {}\n", paint.dim(&format!("error: {error}"))));
}

fn render_cpu(out: &mut String, data: &SectionData<CpuStats>, paint: Paint) {
    let cpu = match data {
        SectionData::Collected(cpu) => cpu,
        SectionData::Failed(e) => return render_failure(out, "CPU", &e.error, paint),
    };
    out.push_str(&paint.title("CPU"));
    out.push('\n');
    let freq = cpu
        .freq_mhz_current
        .map(|f| format!("  {f:.0} MHz"))
        .unwrap_or_default();
    out.push_str(&format!(
        "  {} {}{}\n",
        paint.bar(cpu.percent),
        paint.pct(cpu.percent),
        paint.dim(&format!("  {} cores{freq}", cpu.cores_logical)),
    ));
    out.push_str(&format!("    {}\n", paint.dim(&cpu.model)));
    if cpu.percent_per_core.len() > 1 {
        let cores: Vec<String> = cpu
            .percent_per_core
            .iter()
            .enumerate()
            .map(|(i, p)| format!("C{i}:{p:.0}%"))
            .collect();
        out.push_str(&format!("    {}\n", paint.dim(&cores.join("  "))));
    }
}

fn render_ram(out: &mut String, data: &SectionData<RamStats>, paint: Paint) {
    let ram = match data {
        SectionData::Collected(ram) => ram,
        SectionData::Failed(e) => return render_failure(out, "MEMORY", &e.error, paint),
    };
    out.push_str(&paint.title("MEMORY"));
    out.push('\n');
    out.push_str(&format!(
        "  {} {}{}\n",
        paint.bar(ram.percent),
        paint.pct(ram.percent),
        paint.dim(&format!(
            "  {:.2} / {:.2} GB  (free: {:.2} GB)",
            ram.used_gb, ram.total_gb, ram.free_gb
        )),
    ));
    if ram.swap_total_gb > 0.0 {
        out.push_str(&format!(
            "  {} {}{}\n",
            paint.bar(ram.swap_percent),
            paint.pct(ram.swap_percent),
            paint.dim(&format!(
                "  SWAP  {:.2} / {:.2} GB",
                ram.swap_used_gb, ram.swap_total_gb
            )),
        ));
    }
}

fn render_disk(out: &mut String, data: &SectionData<DiskStats>, paint: Paint) {
    let disk = match data {
        SectionData::Collected(disk) => disk,
        SectionData::Failed(e) => return render_failure(out, "DISK", &e.error, paint),
    };
    out.push_str(&paint.title("DISK"));
    out.push('\n');
    for part in &disk.partitions {
        out.push_str(&format!(
            "  {} {}{}  {}\n",
            paint.bar(part.percent),
            paint.pct(part.percent),
            paint.dim(&format!("  {:.1}/{:.1}GB", part.used_gb, part.total_gb)),
            format!("{}  {}", part.mountpoint, paint.dim(&part.fstype)),
        ));
    }
    if let (Some(read), Some(write)) = (disk.io_read_mb, disk.io_write_mb) {
        out.push_str(&format!(
            "    {}\n",
            paint.dim(&format!("I/O - Read: {read:.1} MB  Write: {write:.1} MB")),
        ));
    }
}

fn fmt_speed(mbps: f64) -> String {
    if mbps < 1.0 {
        format!("{:.0} Kbps", mbps * 1000.0)
    } else {
        format!("{mbps:.2} Mbps")
    }
}

fn render_network(out: &mut String, data: &SectionData<NetworkStats>, paint: Paint) {
    let net = match data {
        SectionData::Collected(net) => net,
        SectionData::Failed(e) => return render_failure(out, "NETWORK", &e.error, paint),
    };
    out.push_str(&paint.title("NETWORK"));
    out.push('\n');
    if let (Some(up), Some(down)) = (net.speed_up_mbps, net.speed_dn_mbps) {
        out.push_str(&format!(
            "  ↑ {:<14} ↓ {}\n",
            fmt_speed(up),
            fmt_speed(down)
        ));
    }
    out.push_str(&format!(
        "    {}\n",
        paint.dim(&format!(
            "Total sent: {:.1} MB  recv: {:.1} MB  errors: {}/{}",
            net.sent_total_mb, net.recv_total_mb, net.errors_in, net.errors_out
        )),
    ));
    for iface in &net.interfaces {
        if iface.addresses.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "    {}{}\n",
            paint.dim(&format!("{:<12}", iface.name)),
            iface.addresses.join("  "),
        ));
    }
}

fn render_temperature(out: &mut String, data: &SectionData<TemperatureStats>, paint: Paint) {
    let temp = match data {
        SectionData::Collected(temp) => temp,
        SectionData::Failed(e) => return render_failure(out, "TEMPERATURE", &e.error, paint),
    };
    if temp.sensors.is_empty() {
        return;
    }
    out.push_str(&paint.title("TEMPERATURE"));
    out.push('\n');
    for SensorReading { label, current, .. } in &temp.sensors {
        let bar_pct = (current / 85.0 * 100.0).min(100.0);
        out.push_str(&format!(
            "  {} {}  {}\n",
            paint.bar(bar_pct),
            paint.strong(&format!("{current:5.1}°C")),
            paint.dim(label),
        ));
    }
}

fn render_uptime(out: &mut String, data: &SectionData<UptimeStats>, paint: Paint) {
    let uptime = match data {
        SectionData::Collected(uptime) => uptime,
        SectionData::Failed(e) => return render_failure(out, "UPTIME", &e.error, paint),
    };
    out.push_str(&paint.title("UPTIME"));
    out.push('\n');
    out.push_str(&format!(
        "    {}{}\n",
        uptime.uptime_human,
        paint.dim(&format!("  (boot: {})", uptime.boot_time.format("%Y-%m-%d %H:%M:%S"))),
    ));
}

fn render_os(out: &mut String, data: &SectionData<OsStats>, paint: Paint) {
    let os = match data {
        SectionData::Collected(os) => os,
        SectionData::Failed(e) => return render_failure(out, "OS", &e.error, paint),
    };
    out.push_str(&paint.title("OS"));
    out.push('\n');
    let rows = [
        ("Hostname", Some(os.hostname.clone())),
        ("OS", os.distro_name.clone().or_else(|| os.system.clone())),
        ("Kernel", os.kernel.clone()),
        ("Architecture", os.architecture.clone()),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            out.push_str(&format!("    {}{value}\n", paint.dim(&format!("{label:<14}"))));
        }
    }
}

fn render_hardware(out: &mut String, data: &SectionData<HardwareStats>, paint: Paint) {
    let hw = match data {
        SectionData::Collected(hw) => hw,
        SectionData::Failed(e) => return render_failure(out, "HARDWARE", &e.error, paint),
    };
    out.push_str(&paint.title("HARDWARE"));
    out.push('\n');
    let rows = [
        ("Manufacturer", &hw.manufacturer),
        ("Product", &hw.product_name),
        ("Serial", &hw.serial_number),
        ("UUID", &hw.uuid),
        ("BIOS", &hw.bios_vendor),
        ("BIOS Ver", &hw.bios_version),
        ("Chassis", &hw.chassis_type),
        ("RPi Model", &hw.rpi_model),
        ("RPi Serial", &hw.rpi_serial),
        ("RPi Revision", &hw.rpi_revision),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            out.push_str(&format!("    {}{value}\n", paint.dim(&format!("{label:<16}"))));
        }
    }
    if let Some(note) = &hw.note {
        out.push_str(&format!("    {}\n", paint.dim(note)));
    }
}

fn render_process_rows(out: &mut String, rows: &[ProcessEntry], paint: Paint, by_mem: bool) {
    for p in rows {
        let pct = if by_mem { p.mem_pct } else { p.cpu_pct };
        out.push_str(&format!(
            "      {:>6}  {}  {:<24}{}\n",
            p.pid,
            paint.pct(pct),
            p.name,
            paint.dim(p.user.as_deref().unwrap_or("?")),
        ));
    }
}

fn render_processes(out: &mut String, data: &SectionData<ProcessStats>, paint: Paint) {
    let procs = match data {
        SectionData::Collected(procs) => procs,
        SectionData::Failed(e) => return render_failure(out, "PROCESSES", &e.error, paint),
    };
    out.push_str(&paint.title("PROCESSES"));
    out.push('\n');
    out.push_str(&format!(
        "    {}{}   {}{}\n",
        paint.dim("Total: "),
        procs.total,
        paint.dim("Running: "),
        procs.running,
    ));
    if !procs.top_cpu.is_empty() {
        out.push_str(&format!("    {}\n", paint.dim("Top CPU:")));
        render_process_rows(out, &procs.top_cpu, paint, false);
    }
    if !procs.top_mem.is_empty() {
        out.push_str(&format!("    {}\n", paint.dim("Top Memory:")));
        render_process_rows(out, &procs.top_mem, paint, true);
    }
}

fn render_users(out: &mut String, data: &SectionData<UserStats>, paint: Paint) {
    let users = match data {
        SectionData::Collected(users) => users,
        SectionData::Failed(e) => return render_failure(out, "USERS", &e.error, paint),
    };
    if users.logged_in.is_empty() {
        return;
    }
    out.push_str(&paint.title("USERS"));
    out.push('\n');
    for session in &users.logged_in {
        out.push_str(&format!(
            "    {:<16}{}\n",
            session.name,
            paint.dim(&format!(
                "{:<8}  {:<16}  {}",
                session.terminal.as_deref().unwrap_or("?"),
                session.host.as_deref().unwrap_or("local"),
                session.started.as_deref().unwrap_or("?"),
            )),
        ));
    }
}

fn render_battery(out: &mut String, data: &SectionData<BatteryStats>, paint: Paint) {
    let battery = match data {
        SectionData::Collected(battery) => battery,
        SectionData::Failed(e) => return render_failure(out, "BATTERY", &e.error, paint),
    };
    if !battery.present {
        return;
    }
    out.push_str(&paint.title("BATTERY"));
    out.push('\n');
    let pct = battery.percent.unwrap_or(0.0);
    let state = match battery.plugged_in {
        Some(true) => "Plugged in",
        Some(false) => "On battery",
        None => "Unknown",
    };
    out.push_str(&format!(
        "  {} {}{}\n",
        paint.bar(pct),
        paint.pct(pct),
        paint.dim(&format!("  {state}")),
    ));
}

fn render_gpu(out: &mut String, data: &SectionData<GpuStats>, paint: Paint) {
    let gpu = match data {
        SectionData::Collected(gpu) => gpu,
        SectionData::Failed(e) => return render_failure(out, "GPU", &e.error, paint),
    };
    if gpu.gpus.is_empty() {
        return;
    }
    out.push_str(&paint.title("GPU"));
    out.push('\n');
    for g in &gpu.gpus {
        if let Some(util) = g.util_percent {
            out.push_str(&format!(
                "  {} {}{}\n",
                paint.bar(util),
                paint.pct(util),
                paint.dim(&format!("  {}", g.name)),
            ));
            if let Some(temp) = g.temp_celsius {
                let vram = match (g.mem_used_mb, g.mem_total_mb) {
                    (Some(used), Some(total)) => format!("  VRAM: {used:.0}/{total:.0} MB"),
                    _ => String::new(),
                };
                out.push_str(&format!("    {}\n", paint.dim(&format!("Temp: {temp}°C{vram}"))));
            }
        } else {
            out.push_str(&format!("    {}\n", g.name));
            if let Some(mem) = &g.gpu_mem {
                out.push_str(&format!("    {}\n", paint.dim(&format!("GPU Memory: {mem}"))));
            }
            if let Some(throttled) = &g.throttled {
                out.push_str(&format!("    {}\n", paint.dim(&format!("Throttle:   {throttled}"))));
            }
        }
    }
}
