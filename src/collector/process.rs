//! Process table and logged-in user collectors.

use std::time::Duration;

use sysinfo::{ProcessStatus, Users};

use super::command::run_with_timeout;
use super::{capture, CollectError, SystemSampler};
use crate::snapshot::{round2, ProcessEntry, ProcessStats, SectionData, SessionEntry, UserStats};

/// How many processes each top list carries.
const TOP_N: usize = 5;

/// Budget for the `who` session listing.
const WHO_TIMEOUT: Duration = Duration::from_secs(3);

// =============================================================================
// Processes
// =============================================================================

/// Collect process counts and the heaviest CPU/memory consumers.
pub fn collect_processes(sampler: &mut SystemSampler) -> SectionData<ProcessStats> {
    capture(process_stats(sampler))
}

fn process_stats(sampler: &mut SystemSampler) -> Result<ProcessStats, CollectError> {
    let sys = &mut sampler.sys;
    sys.refresh_processes();
    sys.refresh_memory();

    let users = Users::new_with_refreshed_list();
    let total_memory = sys.total_memory();

    let mut entries: Vec<ProcessEntry> = sys
        .processes()
        .values()
        .map(|p| ProcessEntry {
            pid: p.pid().as_u32(),
            name: p.name().to_string(),
            user: p
                .user_id()
                .and_then(|uid| users.get_user_by_id(uid))
                .map(|u| u.name().to_string()),
            cpu_pct: round2(p.cpu_usage() as f64),
            mem_pct: if total_memory > 0 {
                round2(p.memory() as f64 / total_memory as f64 * 100.0)
            } else {
                0.0
            },
            status: p.status().to_string(),
        })
        .collect();

    let total = entries.len();
    let running = sys
        .processes()
        .values()
        .filter(|p| matches!(p.status(), ProcessStatus::Run))
        .count();

    entries.sort_by(|a, b| b.cpu_pct.total_cmp(&a.cpu_pct));
    let top_cpu = entries.iter().take(TOP_N).cloned().collect();

    entries.sort_by(|a, b| b.mem_pct.total_cmp(&a.mem_pct));
    let top_mem = entries.iter().take(TOP_N).cloned().collect();

    Ok(ProcessStats {
        total,
        running,
        top_cpu,
        top_mem,
    })
}

// =============================================================================
// Users
// =============================================================================

/// Collect logged-in sessions via `who`.
pub fn collect_users() -> SectionData<UserStats> {
    capture(user_stats())
}

fn user_stats() -> Result<UserStats, CollectError> {
    let output = match run_with_timeout("who", &[], WHO_TIMEOUT) {
        Ok(output) => output,
        // A host without `who` simply has no session accounting.
        Err(e) if e.is_not_found() => String::new(),
        Err(e) => return Err(CollectError::Command(e)),
    };

    let logged_in: Vec<SessionEntry> = output.lines().filter_map(parse_who_line).collect();
    Ok(UserStats {
        count: logged_in.len(),
        logged_in,
    })
}

/// Parse one `who` line: `name tty date time [(host)]`.
fn parse_who_line(line: &str) -> Option<SessionEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let (name, rest) = fields.split_first()?;

    let host = rest
        .iter()
        .find(|f| f.starts_with('('))
        .map(|f| f.trim_matches(|c| c == '(' || c == ')').to_string());
    let terminal = rest.first().map(|t| t.to_string());
    let started = match rest {
        [_, date, time, ..] => Some(format!("{date} {time}")),
        _ => None,
    };

    Some(SessionEntry {
        name: name.to_string(),
        terminal,
        host,
        started,
    })
}
