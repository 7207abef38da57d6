//! Probe Engine: orchestrates one `pscan` or `netmap` run end to end.
//!
//! Exactly two threads are ever alive during a run: this one (the
//! orchestrator) and the sniffer's capture thread. The orchestrator never
//! touches the capture queue except through [`rawrecon_network::Sniffer`]'s
//! non-blocking reads, so neither thread can stall the other.
//!
//! Sequence, both subcommands:
//!
//! 1. Resolve the target(s) to IPv4 and check raw-socket privileges.
//! 2. Compile the BPF program for this run's response shape.
//! 3. Open and start the sniffer on the default interface.
//! 4. Emit probes, sleeping [`DelayPolicy::sample`] between each.
//! 5. Sleep the quiescence window once the last probe is sent.
//! 6. Stop the sniffer, dissect every queued frame, and fold the results.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use rawrecon_core::config::Config;
use rawrecon_core::error::{Error, Result};
use rawrecon_core::ports::PortSpec;
use rawrecon_core::types::{CapturedResponse, DelayPolicy, HostResult, ProbeKind, ScanSummary};

use rawrecon_network::bpf;
use rawrecon_network::dissector;
use rawrecon_network::interface;
use rawrecon_network::sender;
use rawrecon_network::sniffer::{Sniffer, SnifferState};
use rawrecon_network::{compose_tcp_syn, RawFrame};

use crate::progress::SendProgress;

/// The outcome of one `pscan` run against a single host.
#[derive(Debug, Clone)]
pub struct PscanOutcome {
    pub result: HostResult,
    pub summary: ScanSummary,
}

/// Scan `target_ip` across `ports`, in the order `ports` is already in
/// (the caller shuffles beforehand for `--random`).
pub fn run_pscan(
    target_ip: IpAddr,
    ports: &PortSpec,
    delay: DelayPolicy,
    config: &Config,
) -> Result<PscanOutcome> {
    let target_v4 = require_ipv4(target_ip)?;
    rawrecon_network::check_privileges()?;

    let iface = interface::resolve_interface(config.network.interface.as_deref())
        .map_err(|e| Error::Sniff(format!("no usable network interface: {e}")))?;
    let local_ip = iface
        .first_ipv4()
        .ok_or_else(|| Error::Sniff(format!("interface {} has no IPv4 address", iface.name)))?;
    let ifindex = rawrecon_network::sniffer::interface_index(&iface.name)
        .map_err(|e| Error::Sniff(format!("resolving interface index: {e}")))?;

    let filter = bpf::tcp_syn_filter(local_ip)?;
    let mut sniffer = Sniffer::open(ifindex, &filter)?;
    sniffer.start()?;

    let progress = SendProgress::new(ports.len() as u64);
    for &port in ports.ports() {
        if rawrecon_core::cancel::is_cancelled() {
            sniffer.stop();
            return Err(Error::Interrupted);
        }
        match send_tcp_syn(target_v4, port, local_ip) {
            Ok(()) => tracing::debug!(target = %target_v4, port, "probe sent"),
            Err(e) => tracing::warn!(target = %target_v4, port, error = %e, "probe send failed"),
        }
        progress.inc();
        let gap = delay.sample(config.engine.default_delay_bounds());
        if !gap.is_zero() && sleep_cancellable(gap) {
            sniffer.stop();
            return Err(Error::Interrupted);
        }
    }
    progress.finish();

    if sleep_cancellable(config.engine.quiescence()) {
        sniffer.stop();
        return Err(Error::Interrupted);
    }

    sniffer.stop();
    debug_assert_eq!(sniffer.state(), SnifferState::Drained);
    let frames = sniffer.drain();

    let mut result = HostResult::new(target_ip);
    for response in dissect_all(&frames) {
        if let CapturedResponse::Tcp {
            src_ip,
            src_port,
            flag_class,
        } = response
        {
            if src_ip == target_ip {
                result.protocols_seen.insert("tcp");
                result.status_by_port.insert(src_port, flag_class);
            }
        }
    }

    let summary = ScanSummary {
        opened: result.opened_count(),
        total: ports.len(),
    };

    Ok(PscanOutcome { result, summary })
}

/// Probe every host on the local /24 with an ICMP Echo plus a TCP SYN to
/// port 80, and return every host that answered either one.
pub fn run_netmap(delay: DelayPolicy, config: &Config) -> Result<Vec<HostResult>> {
    rawrecon_network::check_privileges()?;

    let iface = interface::resolve_interface(config.network.interface.as_deref())
        .map_err(|e| Error::Sniff(format!("no usable network interface: {e}")))?;
    let local_ip = iface
        .first_ipv4()
        .ok_or_else(|| Error::Sniff(format!("interface {} has no IPv4 address", iface.name)))?;
    let ifindex = rawrecon_network::sniffer::interface_index(&iface.name)
        .map_err(|e| Error::Sniff(format!("resolving interface index: {e}")))?;
    let hosts = interface::local_ipv4_subnet_hosts()
        .map_err(|e| Error::Sniff(format!("enumerating local subnet: {e}")))?;

    let filter = bpf::discovery_filter(local_ip)?;
    let mut sniffer = Sniffer::open(ifindex, &filter)?;
    sniffer.start()?;

    const DISCOVERY_PORT: u16 = 80;
    let progress = SendProgress::new(hosts.len() as u64);
    for &host in &hosts {
        if rawrecon_core::cancel::is_cancelled() {
            sniffer.stop();
            return Err(Error::Interrupted);
        }
        if let Err(e) = send_icmp_echo(host, local_ip) {
            tracing::debug!(%host, error = %e, "icmp probe send failed");
        }
        if let Err(e) = send_tcp_syn(host, DISCOVERY_PORT, local_ip) {
            tracing::debug!(%host, error = %e, "tcp probe send failed");
        }
        progress.inc();
        let gap = delay.sample(config.engine.default_delay_bounds());
        if !gap.is_zero() && sleep_cancellable(gap) {
            sniffer.stop();
            return Err(Error::Interrupted);
        }
    }
    progress.finish();

    if sleep_cancellable(config.engine.quiescence()) {
        sniffer.stop();
        return Err(Error::Interrupted);
    }

    sniffer.stop();
    let frames = sniffer.drain();

    let mut by_host: std::collections::BTreeMap<IpAddr, HostResult> = std::collections::BTreeMap::new();
    for response in dissect_all(&frames) {
        match response {
            CapturedResponse::Tcp {
                src_ip,
                src_port,
                flag_class,
            } => {
                let entry = by_host.entry(src_ip).or_insert_with(|| HostResult::new(src_ip));
                entry.protocols_seen.insert("tcp");
                entry.status_by_port.insert(src_port, flag_class);
            }
            CapturedResponse::Icmp { src_ip, src_mac } => {
                let entry = by_host.entry(src_ip).or_insert_with(|| HostResult::new(src_ip));
                entry.protocols_seen.insert("icmp");
                entry.mac.get_or_insert(src_mac);
            }
            CapturedResponse::UdpUnreachable { .. } => {} // not produced by this filter
        }
    }

    Ok(by_host.into_values().collect())
}

/// Probe `target_ip` on `ports` with UDP datagrams and classify each port by
/// whether an ICMP Port-Unreachable came back within the quiescence window.
/// A port with no reply at all is "potentially open" — this engine trusts
/// the same 3-second deadline used elsewhere to distinguish a closed port
/// from silence, since UDP gives no positive open signal to wait for.
///
/// Not wired to a CLI subcommand; kept as a library entry point for a
/// capability that is part of the core engine regardless.
pub fn run_udp_probe(
    target_ip: IpAddr,
    ports: &PortSpec,
    delay: DelayPolicy,
    config: &Config,
) -> Result<PscanOutcome> {
    let target_v4 = require_ipv4(target_ip)?;
    rawrecon_network::check_privileges()?;

    let iface = interface::resolve_interface(config.network.interface.as_deref())
        .map_err(|e| Error::Sniff(format!("no usable network interface: {e}")))?;
    let local_ip = iface
        .first_ipv4()
        .ok_or_else(|| Error::Sniff(format!("interface {} has no IPv4 address", iface.name)))?;
    let ifindex = rawrecon_network::sniffer::interface_index(&iface.name)
        .map_err(|e| Error::Sniff(format!("resolving interface index: {e}")))?;

    let filter = bpf::icmp_unreachable_filter(local_ip)?;
    let mut sniffer = Sniffer::open(ifindex, &filter)?;
    sniffer.start()?;

    let progress = SendProgress::new(ports.len() as u64);
    for &port in ports.ports() {
        if rawrecon_core::cancel::is_cancelled() {
            sniffer.stop();
            return Err(Error::Interrupted);
        }
        match send_udp_probe(target_v4, port, local_ip) {
            Ok(()) => tracing::debug!(target = %target_v4, port, "udp probe sent"),
            Err(e) => tracing::warn!(target = %target_v4, port, error = %e, "udp probe send failed"),
        }
        progress.inc();
        let gap = delay.sample(config.engine.default_delay_bounds());
        if !gap.is_zero() && sleep_cancellable(gap) {
            sniffer.stop();
            return Err(Error::Interrupted);
        }
    }
    progress.finish();

    if sleep_cancellable(config.engine.quiescence()) {
        sniffer.stop();
        return Err(Error::Interrupted);
    }

    sniffer.stop();
    let frames = sniffer.drain();

    let mut result = HostResult::new(target_ip);
    result.protocols_seen.insert("udp");
    for &port in ports.ports() {
        result.status_by_port.insert(port, rawrecon_core::types::FlagClass::Potential);
    }
    for response in dissect_all(&frames) {
        if let CapturedResponse::UdpUnreachable {
            orig_dst_ip,
            orig_dst_port,
        } = response
        {
            if orig_dst_ip == target_ip {
                result
                    .status_by_port
                    .insert(orig_dst_port, rawrecon_core::types::FlagClass::Closed);
            }
        }
    }

    let summary = ScanSummary {
        opened: 0, // UDP never produces a positive "open" signal
        total: ports.len(),
    };

    Ok(PscanOutcome { result, summary })
}

fn send_udp_probe(dst_ip: Ipv4Addr, dst_port: u16, local_ip: Ipv4Addr) -> Result<()> {
    let kind = ProbeKind::UdpProbe {
        dst_ip: IpAddr::V4(dst_ip),
        dst_port,
    };
    let bytes = rawrecon_network::compose(kind, local_ip)?;
    sender::send_layer3(bytes.as_slice(), dst_ip, dst_port)?;
    Ok(())
}

fn dissect_all(frames: &[RawFrame]) -> Vec<CapturedResponse> {
    frames.iter().filter_map(dissector::dissect).collect()
}

fn send_tcp_syn(dst_ip: Ipv4Addr, dst_port: u16, local_ip: Ipv4Addr) -> Result<()> {
    let (bytes, _chosen) = compose_tcp_syn(IpAddr::V4(dst_ip), dst_port, local_ip)?;
    sender::send_layer3(bytes.as_slice(), dst_ip, dst_port)?;
    Ok(())
}

fn send_icmp_echo(dst_ip: Ipv4Addr, local_ip: Ipv4Addr) -> Result<()> {
    let kind = ProbeKind::IcmpEcho {
        dst_ip: IpAddr::V4(dst_ip),
    };
    let bytes = rawrecon_network::compose(kind, local_ip)?;
    sender::send_icmp(bytes.as_slice(), dst_ip)?;
    Ok(())
}

/// Sleep for `total`, polling the cancellation flag every 50ms so a `Ctrl-C`
/// during a multi-second gap or the quiescence window is noticed promptly
/// instead of riding out the full sleep. Returns `true` if cancellation was
/// observed (the caller should unwind via `Error::Interrupted`).
fn sleep_cancellable(total: Duration) -> bool {
    const SLICE: Duration = Duration::from_millis(50);
    let mut remaining = total;
    loop {
        if rawrecon_core::cancel::is_cancelled() {
            return true;
        }
        if remaining.is_zero() {
            return false;
        }
        let step = remaining.min(SLICE);
        std::thread::sleep(step);
        remaining -= step;
    }
}

fn require_ipv4(addr: IpAddr) -> Result<Ipv4Addr> {
    match addr {
        IpAddr::V4(v4) => Ok(v4),
        IpAddr::V6(v6) => Err(Error::Usage(format!(
            "IPv6 targets are not supported: {v6}"
        ))),
    }
}
