//! Port specification parsing and the well-known-port description catalogue.
//!
//! `PortSpec` implements the `--port` grammar of `pscan`: a comma-separated
//! list of individual port numbers and inclusive ranges `a-b` with `a < b`.
//! `describe_port` backs the "Ephemeral/Dynamic" fallback label for ports
//! outside the catalogue, and `common_ports`/`uncommon_ports` back `--all`.

use crate::error::{Error, Result};

/// A parsed, order-preserving, de-duplicated list of TCP/UDP ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    ports: Vec<u16>,
}

impl PortSpec {
    /// Parse `"80,443,8000-8002"`-style specifications.
    ///
    /// Each comma-separated clause is either a bare port or a range `a-b`
    /// with `a < b` (equal bounds, e.g. `"1-1"`, are rejected as a malformed
    /// range rather than treated as a single-port range).
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::Usage("empty port specification".to_string()));
        }

        let mut ports = Vec::new();
        for clause in trimmed.split(',') {
            let clause = clause.trim();
            if clause.is_empty() {
                return Err(Error::Usage(format!(
                    "empty clause in port specification {input:?}"
                )));
            }

            if let Some((start_str, end_str)) = clause.split_once('-') {
                let start: u16 = start_str.trim().parse().map_err(|_| {
                    Error::Usage(format!("invalid port number {:?}", start_str.trim()))
                })?;
                let end: u16 = end_str.trim().parse().map_err(|_| {
                    Error::Usage(format!("invalid port number {:?}", end_str.trim()))
                })?;
                if start >= end {
                    return Err(Error::Usage(format!(
                        "invalid port range {clause:?}: start must be less than end"
                    )));
                }
                ports.extend(start..=end);
            } else {
                let port: u16 = clause
                    .parse()
                    .map_err(|_| Error::Usage(format!("invalid port number {clause:?}")))?;
                ports.push(port);
            }
        }

        ports.sort_unstable();
        ports.dedup();
        Ok(Self { ports })
    }

    /// Build a spec from an explicit port list, e.g. the `--all` union.
    pub fn from_ports(mut ports: Vec<u16>) -> Self {
        ports.sort_unstable();
        ports.dedup();
        Self { ports }
    }

    /// The ports in ascending order.
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Shuffle in place for `--random`.
    pub fn shuffle(&mut self) {
        use rand::seq::SliceRandom;
        self.ports.shuffle(&mut rand::thread_rng());
    }
}

/// Well-known TCP ports, common enough to be scanned by default with `--all`.
pub const COMMON_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 995, 1723, 3306, 3389, 5900,
    8080,
];

/// Additional, less common TCP ports included in the `--all` union.
pub const UNCOMMON_PORTS: &[u16] = &[
    20, 37, 69, 79, 88, 102, 113, 119, 123, 137, 138, 161, 162, 179, 194, 389, 427, 465, 500, 514,
    515, 520, 554, 587, 631, 636, 873, 902, 989, 990, 992, 1025, 1080, 1194, 1433, 1521, 2049,
    2082, 2083, 2222, 3128, 4444, 5000, 5060, 5432, 5631, 5666, 5800, 6000, 6379, 6667, 8000,
    8008, 8443, 8888, 9000, 9090, 9200, 10000, 27017,
];

/// Return the union of [`COMMON_PORTS`] and [`UNCOMMON_PORTS`] for `--all`.
pub fn all_ports() -> PortSpec {
    let mut ports: Vec<u16> = COMMON_PORTS.iter().chain(UNCOMMON_PORTS).copied().collect();
    ports.sort_unstable();
    ports.dedup();
    PortSpec::from_ports(ports)
}

/// A short description for a port, falling back to "Ephemeral/Dynamic" for
/// anything not in the built-in catalogue.
pub fn describe_port(port: u16) -> &'static str {
    match port {
        20 => "FTP-DATA",
        21 => "FTP",
        22 => "SSH",
        23 => "Telnet",
        25 => "SMTP",
        53 => "DNS",
        80 => "HTTP",
        110 => "POP3",
        111 => "RPCbind",
        135 => "MS-RPC",
        139 => "NetBIOS-SSN",
        143 => "IMAP",
        161 => "SNMP",
        389 => "LDAP",
        443 => "HTTPS",
        445 => "SMB",
        465 => "SMTPS",
        587 => "SMTP-Submission",
        631 => "IPP",
        993 => "IMAPS",
        995 => "POP3S",
        1433 => "MSSQL",
        1521 => "Oracle-TNS",
        1723 => "PPTP",
        3306 => "MySQL",
        3389 => "RDP",
        5432 => "PostgreSQL",
        5900 => "VNC",
        6379 => "Redis",
        6667 => "IRC",
        8080 => "HTTP-Alt",
        8443 => "HTTPS-Alt",
        27017 => "MongoDB",
        _ => "Ephemeral/Dynamic",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_port() {
        let spec = PortSpec::parse("80").unwrap();
        assert_eq!(spec.ports(), &[80]);
    }

    #[test]
    fn inclusive_range() {
        let spec = PortSpec::parse("1-2").unwrap();
        assert_eq!(spec.ports(), &[1, 2]);
    }

    #[test]
    fn equal_bounds_is_an_error() {
        assert!(PortSpec::parse("1-1").is_err());
    }

    #[test]
    fn descending_bounds_is_an_error() {
        assert!(PortSpec::parse("100-50").is_err());
    }

    #[test]
    fn mixed_list_and_range() {
        let spec = PortSpec::parse("80,443,8000-8002").unwrap();
        assert_eq!(spec.ports(), &[80, 443, 8000, 8001, 8002]);
    }

    #[test]
    fn duplicates_are_deduplicated() {
        let spec = PortSpec::parse("80,80,81-82,82").unwrap();
        assert_eq!(spec.ports(), &[80, 81, 82]);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(PortSpec::parse("").is_err());
        assert!(PortSpec::parse("   ").is_err());
    }

    #[test]
    fn unknown_port_is_ephemeral_dynamic() {
        assert_eq!(describe_port(54321), "Ephemeral/Dynamic");
    }

    #[test]
    fn well_known_port_is_named() {
        assert_eq!(describe_port(22), "SSH");
    }

    #[test]
    fn all_ports_is_sorted_and_deduplicated() {
        let spec = all_ports();
        let mut sorted = spec.ports().to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(spec.ports(), sorted.as_slice());
    }
}
