//! Packet composer: turns a [`ProbeKind`] into the exact bytes handed to
//! [`crate::sender`].
//!
//! One value, `RawProbeBytes`, produced by a single free function. There is
//! no base class and no singleton; the dependency on [`crate::header`] is
//! explicit.

use rawrecon_core::error::Result;
use rawrecon_core::types::ProbeKind;

use crate::header;

/// The composed bytes for one probe, ready for [`crate::sender`].
///
/// For `TcpSyn`/`UdpProbe` this is `ip_header ++ transport_header`, sent on
/// an `IP_HDRINCL` socket. For `IcmpEcho` it is `icmp_header ++ payload`
/// only — the raw ICMP socket supplies its own IP header.
#[derive(Debug, Clone)]
pub struct RawProbeBytes(Vec<u8>);

impl RawProbeBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The source port chosen for a composed TCP SYN probe. Needed by the
/// engine to hand the BPF compiler the expected-reply port set.
#[derive(Debug, Clone, Copy)]
pub struct ComposedTcpSyn {
    pub src_port: u16,
}

/// Compose the full probe bytes for `kind`, given the local host's primary
/// IPv4 address as the probe's source.
///
/// Deterministic for a given `kind` except for the randomised IP id, TCP
/// source port, and ICMP payload.
pub fn compose(kind: ProbeKind, local_ip: std::net::Ipv4Addr) -> Result<RawProbeBytes> {
    match kind {
        ProbeKind::TcpSyn { dst_ip, dst_port } => {
            let dst_v4 = header::require_ipv4(dst_ip)?;
            let src_port = header::random_source_port();
            let tcp = header::build_tcp_syn(local_ip, dst_v4, src_port, dst_port);
            let ip = header::build_ipv4(local_ip, dst_v4, header::proto::TCP, 40, 64);
            let mut buf = Vec::with_capacity(40);
            buf.extend_from_slice(&ip);
            buf.extend_from_slice(&tcp);
            Ok(RawProbeBytes(buf))
        }
        ProbeKind::UdpProbe { dst_ip, dst_port } => {
            let dst_v4 = header::require_ipv4(dst_ip)?;
            let src_port = header::random_source_port();
            let udp = header::build_udp(local_ip, dst_v4, src_port, dst_port);
            let ip = header::build_ipv4(local_ip, dst_v4, header::proto::UDP, 28, 64);
            let mut buf = Vec::with_capacity(28);
            buf.extend_from_slice(&ip);
            buf.extend_from_slice(&udp);
            Ok(RawProbeBytes(buf))
        }
        ProbeKind::IcmpEcho { dst_ip: _ } => {
            let icmp = header::build_icmp_echo(header::icmp_identifier(), 1);
            Ok(RawProbeBytes(icmp))
        }
    }
}

/// Compose a TCP SYN probe and return both the bytes and the source port
/// chosen for it, so the caller can register the port with the sniffer's
/// filter before sending.
pub fn compose_tcp_syn(
    dst_ip: std::net::IpAddr,
    dst_port: u16,
    local_ip: std::net::Ipv4Addr,
) -> Result<(RawProbeBytes, ComposedTcpSyn)> {
    let dst_v4 = header::require_ipv4(dst_ip)?;
    let src_port = header::random_source_port();
    let tcp = header::build_tcp_syn(local_ip, dst_v4, src_port, dst_port);
    let ip = header::build_ipv4(local_ip, dst_v4, header::proto::TCP, 40, 64);
    let mut buf = Vec::with_capacity(40);
    buf.extend_from_slice(&ip);
    buf.extend_from_slice(&tcp);
    Ok((RawProbeBytes(buf), ComposedTcpSyn { src_port }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_syn_probe_is_40_bytes() {
        let local: std::net::Ipv4Addr = "10.0.0.5".parse().unwrap();
        let kind = ProbeKind::TcpSyn {
            dst_ip: "10.0.0.1".parse().unwrap(),
            dst_port: 80,
        };
        let bytes = compose(kind, local).unwrap();
        assert_eq!(bytes.len(), 40);
    }

    #[test]
    fn udp_probe_is_28_bytes() {
        let local: std::net::Ipv4Addr = "10.0.0.5".parse().unwrap();
        let kind = ProbeKind::UdpProbe {
            dst_ip: "10.0.0.1".parse().unwrap(),
            dst_port: 53,
        };
        let bytes = compose(kind, local).unwrap();
        assert_eq!(bytes.len(), 28);
    }

    #[test]
    fn icmp_echo_probe_is_8_plus_payload_bytes() {
        let local: std::net::Ipv4Addr = "10.0.0.5".parse().unwrap();
        let kind = ProbeKind::IcmpEcho {
            dst_ip: "10.0.0.1".parse().unwrap(),
        };
        let bytes = compose(kind, local).unwrap();
        assert_eq!(bytes.len(), 8 + header::ICMP_ECHO_PAYLOAD_LEN);
    }

    #[test]
    fn compose_tcp_syn_reports_chosen_source_port() {
        let local: std::net::Ipv4Addr = "10.0.0.5".parse().unwrap();
        let (bytes, chosen) =
            compose_tcp_syn("10.0.0.1".parse().unwrap(), 443, local).unwrap();
        let tcp_src = u16::from_be_bytes([bytes.as_slice()[20], bytes.as_slice()[21]]);
        assert_eq!(tcp_src, chosen.src_port);
        assert!(header::TCP_SOURCE_PORT_RANGE.contains(&chosen.src_port));
    }

    #[test]
    fn ipv6_destination_is_a_build_error() {
        let local: std::net::Ipv4Addr = "10.0.0.5".parse().unwrap();
        let kind = ProbeKind::TcpSyn {
            dst_ip: "::1".parse().unwrap(),
            dst_port: 80,
        };
        assert!(compose(kind, local).is_err());
    }
}
