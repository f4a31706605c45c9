//! Network collector with optional live throughput sampling.

use std::time::Duration;

use super::{capture, CollectError, SystemSampler};
use crate::snapshot::{mb, round3, InterfaceStats, NetworkStats, SectionData};

/// Fixed window for the throughput sample.
///
/// Speed is the delta of the cumulative byte counters across this window,
/// measured entirely inside the cycle, so enabling it costs the cycle at
/// least this long. There is no cross-cycle baseline: the first cycle
/// reports a real measurement like every other one.
pub const SPEED_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Collect throughput, counters and interface inventory.
pub fn collect_network(sampler: &mut SystemSampler, speed: bool) -> SectionData<NetworkStats> {
    capture(network_stats(sampler, speed))
}

fn network_stats(sampler: &mut SystemSampler, speed: bool) -> Result<NetworkStats, CollectError> {
    let networks = &mut sampler.networks;
    // Re-list to pick up interfaces that appeared since the last cycle; this
    // also opens the sampling window.
    networks.refresh_list();

    let (speed_up_mbps, speed_dn_mbps) = if speed {
        std::thread::sleep(SPEED_SAMPLE_WINDOW);
        networks.refresh();
        let sent: u64 = networks.iter().map(|(_, data)| data.transmitted()).sum();
        let received: u64 = networks.iter().map(|(_, data)| data.received()).sum();
        (
            Some(round3(sent as f64 * 8.0 / 1e6)),
            Some(round3(received as f64 * 8.0 / 1e6)),
        )
    } else {
        (None, None)
    };

    let mut sent_total: u64 = 0;
    let mut recv_total: u64 = 0;
    let mut packets_sent: u64 = 0;
    let mut packets_recv: u64 = 0;
    let mut errors_in: u64 = 0;
    let mut errors_out: u64 = 0;
    let mut interfaces = Vec::new();

    for (name, data) in networks.iter() {
        sent_total += data.total_transmitted();
        recv_total += data.total_received();
        packets_sent += data.total_packets_transmitted();
        packets_recv += data.total_packets_received();
        errors_in += data.total_errors_on_received();
        errors_out += data.total_errors_on_transmitted();

        interfaces.push(InterfaceStats {
            name: name.clone(),
            mac: data.mac_address().to_string(),
            addresses: data
                .ip_networks()
                .iter()
                .map(|ip| format!("{}/{}", ip.addr, ip.prefix))
                .collect(),
        });
    }

    Ok(NetworkStats {
        speed_up_mbps,
        speed_dn_mbps,
        sent_total_mb: mb(sent_total),
        recv_total_mb: mb(recv_total),
        packets_sent,
        packets_recv,
        errors_in,
        errors_out,
        interfaces,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_without_speed_has_no_speed_fields() {
        let mut sampler = SystemSampler::new();
        let stats = collect_network(&mut sampler, false);
        let stats = stats.collected().expect("network collection should succeed");
        assert!(stats.speed_up_mbps.is_none());
        assert!(stats.speed_dn_mbps.is_none());
    }

    #[test]
    fn test_collect_with_speed_takes_the_window() {
        let mut sampler = SystemSampler::new();
        let start = std::time::Instant::now();
        let stats = collect_network(&mut sampler, true);
        assert!(start.elapsed() >= SPEED_SAMPLE_WINDOW);

        let stats = stats.collected().expect("network collection should succeed");
        assert!(stats.speed_up_mbps.is_some());
        assert!(stats.speed_dn_mbps.is_some());
        assert!(stats.speed_up_mbps.unwrap() >= 0.0);
    }
}
