//! Shared domain vocabulary for the probe-and-capture engine.
//!
//! These types have no socket or kernel dependency; they are pure data so
//! that `rawrecon-network`'s dissector and `rawrecon-scanner`'s engine can
//! agree on shapes without either one pulling in the other's machinery.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{Error, Result};

/// What a single probe is trying to provoke a response to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    TcpSyn { dst_ip: IpAddr, dst_port: u16 },
    IcmpEcho { dst_ip: IpAddr },
    UdpProbe { dst_ip: IpAddr, dst_port: u16 },
}

impl ProbeKind {
    pub fn dst_ip(&self) -> IpAddr {
        match self {
            ProbeKind::TcpSyn { dst_ip, .. } => *dst_ip,
            ProbeKind::IcmpEcho { dst_ip } => *dst_ip,
            ProbeKind::UdpProbe { dst_ip, .. } => *dst_ip,
        }
    }
}

/// The semantic bucket a captured TCP flag byte falls into.
///
/// Derived from byte 13 of the TCP header masked with `0b0011_1111`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagClass {
    /// SYN+ACK: the port is open.
    Opened,
    /// SYN only: a half-open responder, potentially open.
    Potential,
    /// RST or RST+ACK: the port is closed.
    Closed,
    /// FIN: the connection was terminated.
    Terminated,
    /// Anything else the filter matched but none of the above recognised.
    Filtered,
}

impl FlagClass {
    /// Classify a masked TCP flag byte (`flags & 0x3F`) per the fixed table.
    pub fn from_masked_byte(masked: u8) -> Self {
        match masked {
            0b0001_0010 => FlagClass::Opened,
            0b0000_0010 => FlagClass::Potential,
            0b0001_0100 => FlagClass::Closed,
            0b0000_0100 => FlagClass::Closed,
            0b0000_0001 => FlagClass::Terminated,
            _ => FlagClass::Filtered,
        }
    }

    /// The human-readable label used in `pscan` output.
    pub fn label(&self) -> &'static str {
        match self {
            FlagClass::Opened => "Opened",
            FlagClass::Potential => "Potentially Open",
            FlagClass::Closed => "Closed",
            FlagClass::Terminated => "Connection Terminated",
            FlagClass::Filtered => "Filtered",
        }
    }
}

impl fmt::Display for FlagClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A decoded response, tagged by which probe kind provoked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedResponse {
    Tcp {
        src_ip: IpAddr,
        src_port: u16,
        flag_class: FlagClass,
    },
    Icmp {
        src_ip: IpAddr,
        src_mac: String,
    },
    UdpUnreachable {
        orig_dst_ip: IpAddr,
        orig_dst_port: u16,
    },
}

/// The aggregated outcome of probing one host across a run.
#[derive(Debug, Clone, Default)]
pub struct HostResult {
    pub ip: Option<IpAddr>,
    pub mac: Option<String>,
    pub protocols_seen: HashSet<&'static str>,
    pub status_by_port: BTreeMap<u16, FlagClass>,
}

impl HostResult {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip: Some(ip),
            mac: None,
            protocols_seen: HashSet::new(),
            status_by_port: BTreeMap::new(),
        }
    }

    /// Count of ports classified as [`FlagClass::Opened`].
    pub fn opened_count(&self) -> usize {
        self.status_by_port
            .values()
            .filter(|c| matches!(c, FlagClass::Opened))
            .count()
    }
}

/// The four delay-policy shapes accepted by `--delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelayPolicy {
    /// No delay between probes.
    Disabled,
    /// Uniform random delay in the engine config's default bounds
    /// (`[0.5, 2.0]` seconds unless a config file overrides them).
    RandomDefault,
    /// Uniform random delay in `[lo, hi]` seconds.
    RandomRange { lo: f64, hi: f64 },
    /// Constant delay in seconds.
    Fixed(f64),
}

impl DelayPolicy {
    /// Sample one delay duration for a single inter-probe gap.
    ///
    /// `default_bounds` is `(lo, hi)` in seconds and is only consulted for
    /// [`DelayPolicy::RandomDefault`]; callers pass
    /// `config.engine.default_delay_bounds()`.
    pub fn sample(&self, default_bounds: (f64, f64)) -> std::time::Duration {
        use rand::Rng;
        let secs = match self {
            DelayPolicy::Disabled => 0.0,
            DelayPolicy::RandomDefault => {
                let (lo, hi) = default_bounds;
                rand::thread_rng().gen_range(lo..=hi)
            }
            DelayPolicy::RandomRange { lo, hi } => rand::thread_rng().gen_range(*lo..=*hi),
            DelayPolicy::Fixed(x) => *x,
        };
        std::time::Duration::from_secs_f64(secs.max(0.0))
    }
}

impl FromStr for DelayPolicy {
    type Err = Error;

    /// Parse the value given to `--delay` once the flag is known to be
    /// present (absence is handled by the caller, not this type: it maps to
    /// [`DelayPolicy::Disabled`] without ever calling `parse`).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(DelayPolicy::RandomDefault);
        }

        if let Some((lo_str, hi_str)) = s.split_once('-') {
            let lo: f64 = lo_str
                .trim()
                .parse()
                .map_err(|_| Error::Usage(format!("invalid delay bound {:?}", lo_str.trim())))?;
            let hi: f64 = hi_str
                .trim()
                .parse()
                .map_err(|_| Error::Usage(format!("invalid delay bound {:?}", hi_str.trim())))?;
            if !(lo < hi) {
                return Err(Error::Usage(format!(
                    "invalid delay range {s:?}: lower bound must be less than upper bound"
                )));
            }
            return Ok(DelayPolicy::RandomRange { lo, hi });
        }

        let x: f64 = s
            .parse()
            .map_err(|_| Error::Usage(format!("invalid delay value {s:?}")))?;
        if x < 0.0 {
            return Err(Error::Usage(format!("delay {s:?} must not be negative")));
        }
        Ok(DelayPolicy::Fixed(x))
    }
}

/// Per-run summary printed after a `pscan`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanSummary {
    pub opened: usize,
    pub total: usize,
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Open ports: {}/{}", self.opened, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_class_from_masked_byte_matches_table() {
        assert_eq!(FlagClass::from_masked_byte(0b0001_0010), FlagClass::Opened);
        assert_eq!(
            FlagClass::from_masked_byte(0b0000_0010),
            FlagClass::Potential
        );
        assert_eq!(FlagClass::from_masked_byte(0b0001_0100), FlagClass::Closed);
        assert_eq!(FlagClass::from_masked_byte(0b0000_0100), FlagClass::Closed);
        assert_eq!(
            FlagClass::from_masked_byte(0b0000_0001),
            FlagClass::Terminated
        );
        assert_eq!(
            FlagClass::from_masked_byte(0b0010_1000),
            FlagClass::Filtered
        );
    }

    #[test]
    fn host_result_counts_opened_ports() {
        let mut result = HostResult::new("127.0.0.1".parse().unwrap());
        result.status_by_port.insert(22, FlagClass::Opened);
        result.status_by_port.insert(23, FlagClass::Closed);
        result.status_by_port.insert(9, FlagClass::Opened);
        assert_eq!(result.opened_count(), 2);
    }

    #[test]
    fn delay_policy_absent_value_is_random_default() {
        assert_eq!(DelayPolicy::from_str("").unwrap(), DelayPolicy::RandomDefault);
    }

    #[test]
    fn delay_policy_range() {
        let policy = DelayPolicy::from_str("0.1-0.2").unwrap();
        assert_eq!(policy, DelayPolicy::RandomRange { lo: 0.1, hi: 0.2 });
    }

    #[test]
    fn delay_policy_fixed() {
        assert_eq!(DelayPolicy::from_str("1.5").unwrap(), DelayPolicy::Fixed(1.5));
    }

    #[test]
    fn delay_policy_rejects_backwards_range() {
        assert!(DelayPolicy::from_str("2.0-0.5").is_err());
    }

    #[test]
    fn scan_summary_display() {
        let summary = ScanSummary { opened: 1, total: 1 };
        assert_eq!(summary.to_string(), "Open ports: 1/1");
    }
}
