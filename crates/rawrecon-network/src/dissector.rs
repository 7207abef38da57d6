//! Ethernet/IPv4/{TCP|ICMP|UDP} dissection.
//!
//! Turns the raw bytes [`crate::sniffer::Sniffer`] hands back into a
//! [`CapturedResponse`], the one shape every probe kind's reply collapses
//! into before the engine classifies it. Offsets are computed from the
//! frame itself (IHL-driven), never assumed fixed, since classic-BPF
//! already filtered out everything that isn't IPv4.

use std::net::{IpAddr, Ipv4Addr};

use rawrecon_core::types::{CapturedResponse, FlagClass};

use crate::sniffer::RawFrame;

const ETH_HDR_LEN: usize = 14;
const ETHERTYPE_IPV4: u16 = 0x0800;

const IP_PROTO_ICMP: u8 = 1;
const IP_PROTO_TCP: u8 = 6;
const IP_PROTO_UDP: u8 = 17;

const ICMP_ECHO_REPLY: u8 = 0;
const ICMP_DEST_UNREACHABLE: u8 = 3;
const ICMP_CODE_PORT_UNREACHABLE: u8 = 3;

/// TCP flag bits to keep when classifying a response.
const TCP_FLAGS_MASK: u8 = 0x3F;

/// Decode one captured frame. Returns `None` for anything that isn't one
/// of the three response shapes this engine understands — the BPF filter
/// should make that rare, but the dissector does not trust it blindly.
pub fn dissect(frame: &RawFrame) -> Option<CapturedResponse> {
    let bytes = &frame.bytes;
    if bytes.len() < ETH_HDR_LEN + 20 {
        return None;
    }

    let ethertype = u16::from_be_bytes([bytes[12], bytes[13]]);
    if ethertype != ETHERTYPE_IPV4 {
        return None;
    }

    let src_mac = format_mac(&bytes[6..12]);

    let ip_start = ETH_HDR_LEN;
    let version_ihl = bytes[ip_start];
    if version_ihl >> 4 != 4 {
        return None;
    }
    let ihl = ((version_ihl & 0x0F) as usize) * 4;
    if ihl < 20 || bytes.len() < ip_start + ihl {
        return None;
    }

    let protocol = bytes[ip_start + 9];
    let src_ip = Ipv4Addr::new(
        bytes[ip_start + 12],
        bytes[ip_start + 13],
        bytes[ip_start + 14],
        bytes[ip_start + 15],
    );

    let transport_start = ip_start + ihl;

    match protocol {
        IP_PROTO_TCP => dissect_tcp(bytes, transport_start, src_ip),
        IP_PROTO_ICMP => dissect_icmp(bytes, transport_start, src_ip, src_mac),
        IP_PROTO_UDP => None, // we never expect a direct UDP reply to a probe
        _ => None,
    }
}

fn dissect_tcp(bytes: &[u8], start: usize, src_ip: Ipv4Addr) -> Option<CapturedResponse> {
    if bytes.len() < start + 14 {
        return None;
    }
    let src_port = u16::from_be_bytes([bytes[start], bytes[start + 1]]);
    let flags = bytes[start + 13] & TCP_FLAGS_MASK;
    Some(CapturedResponse::Tcp {
        src_ip: IpAddr::V4(src_ip),
        src_port,
        flag_class: FlagClass::from_masked_byte(flags),
    })
}

fn dissect_icmp(
    bytes: &[u8],
    start: usize,
    src_ip: Ipv4Addr,
    src_mac: String,
) -> Option<CapturedResponse> {
    if bytes.len() < start + 8 {
        return None;
    }
    let icmp_type = bytes[start];
    let icmp_code = bytes[start + 1];

    match (icmp_type, icmp_code) {
        (ICMP_ECHO_REPLY, _) => Some(CapturedResponse::Icmp {
            src_ip: IpAddr::V4(src_ip),
            src_mac,
        }),
        (ICMP_DEST_UNREACHABLE, ICMP_CODE_PORT_UNREACHABLE) => {
            dissect_embedded_udp_unreachable(bytes, start)
        }
        _ => None,
    }
}

/// An ICMP Port Unreachable carries, after its own 8-byte header, the
/// offending IPv4 header followed by the first 8 bytes of the original UDP
/// datagram — enough to recover which `(dst_ip, dst_port)` was probed.
fn dissect_embedded_udp_unreachable(bytes: &[u8], icmp_start: usize) -> Option<CapturedResponse> {
    let embedded_ip_start = icmp_start + 8;
    if bytes.len() < embedded_ip_start + 20 {
        return None;
    }
    let version_ihl = bytes[embedded_ip_start];
    if version_ihl >> 4 != 4 {
        return None;
    }
    let embedded_ihl = ((version_ihl & 0x0F) as usize) * 4;
    let embedded_udp_start = embedded_ip_start + embedded_ihl;
    if bytes.len() < embedded_udp_start + 4 {
        return None;
    }

    let orig_dst_ip = Ipv4Addr::new(
        bytes[embedded_ip_start + 16],
        bytes[embedded_ip_start + 17],
        bytes[embedded_ip_start + 18],
        bytes[embedded_ip_start + 19],
    );
    let orig_dst_port = u16::from_be_bytes([bytes[embedded_udp_start + 2], bytes[embedded_udp_start + 3]]);

    Some(CapturedResponse::UdpUnreachable {
        orig_dst_ip: IpAddr::V4(orig_dst_ip),
        orig_dst_port,
    })
}

fn format_mac(octets: &[u8]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        octets[0], octets[1], octets[2], octets[3], octets[4], octets[5]
    )
}
