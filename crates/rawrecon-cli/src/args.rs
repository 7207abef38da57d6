//! Command-line surface: `pscan`, `netmap`, `banner`.

use clap::{Parser, Subcommand};

use rawrecon_core::error::{Error, Result};
use rawrecon_core::types::DelayPolicy;

#[derive(Parser, Debug)]
#[command(name = "rawrecon", version, about = "Raw-packet TCP port scanning, host discovery, and banner grabbing")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// TCP SYN scan a single host.
    Pscan(PscanArgs),
    /// ICMP + TCP host discovery on the local subnet.
    Netmap,
    /// Grab a service banner over an ordinary TCP/TLS connection.
    Banner(BannerArgs),
}

#[derive(clap::Args, Debug)]
pub struct PscanArgs {
    /// Hostname or IPv4 address to scan.
    pub host: String,

    /// Print every response class, not only opened ports.
    #[arg(short = 's', long = "show")]
    pub show: bool,

    /// Shuffle the port order before scanning.
    #[arg(short = 'r', long = "random")]
    pub random: bool,

    /// Ports to scan, e.g. "80,443,8000-8002". Defaults to a common-port set.
    #[arg(short = 'p', long = "port")]
    pub port: Option<String>,

    /// Scan the full built-in common+uncommon port catalogue.
    #[arg(short = 'a', long = "all")]
    pub all: bool,

    /// Delay between probes: omitted disables it, bare flag samples
    /// [0.5, 2.0]s, a value is either a fixed seconds count or a "lo-hi" range.
    #[arg(short = 'd', long = "delay", num_args = 0..=1, default_missing_value = "")]
    pub delay: Option<String>,
}

impl PscanArgs {
    pub fn delay_policy(&self) -> Result<DelayPolicy> {
        match &self.delay {
            None => Ok(DelayPolicy::Disabled),
            Some(spec) => spec.parse(),
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct BannerArgs {
    /// Hostname or IPv4 address to connect to.
    pub host: String,

    /// Protocol to greet: ftp, ssh, http, or https.
    pub protocol: String,

    /// Port to connect on. Defaults to the protocol's well-known port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,
}

impl BannerArgs {
    pub fn resolved_port(&self, protocol: rawrecon_scanner::BannerProtocol) -> u16 {
        use rawrecon_scanner::BannerProtocol::*;
        self.port.unwrap_or(match protocol {
            Ftp => 21,
            Ssh => 22,
            Http => 80,
            Https => 443,
        })
    }
}

/// Build the effective port set for a `pscan` invocation.
pub fn resolve_port_spec(args: &PscanArgs) -> Result<rawrecon_core::ports::PortSpec> {
    let mut spec = if let Some(raw) = &args.port {
        rawrecon_core::ports::PortSpec::parse(raw)?
    } else if args.all {
        rawrecon_core::ports::all_ports()
    } else {
        rawrecon_core::ports::PortSpec::from_ports(rawrecon_core::ports::COMMON_PORTS.to_vec())
    };

    if args.random {
        spec.shuffle();
    }

    Ok(spec)
}

pub fn parse_banner_protocol(raw: &str) -> Result<rawrecon_scanner::BannerProtocol> {
    raw.parse().map_err(|_: Error| {
        Error::Usage(format!(
            "unknown banner protocol {raw:?}; expected one of: ftp, ssh, http, https"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_pscan_with_all_flags() {
        let cli = Cli::parse_from([
            "rawrecon", "pscan", "10.0.0.1", "-s", "-r", "-p", "80,443", "-d", "1.0",
        ]);
        match cli.command {
            Command::Pscan(args) => {
                assert_eq!(args.host, "10.0.0.1");
                assert!(args.show);
                assert!(args.random);
                assert_eq!(args.port.as_deref(), Some("80,443"));
                assert_eq!(args.delay.as_deref(), Some("1.0"));
            }
            other => panic!("expected Pscan, got {other:?}"),
        }
    }

    #[test]
    fn bare_delay_flag_yields_empty_string() {
        let cli = Cli::parse_from(["rawrecon", "pscan", "10.0.0.1", "-d"]);
        match cli.command {
            Command::Pscan(args) => {
                assert_eq!(args.delay.as_deref(), Some(""));
                assert_eq!(args.delay_policy().unwrap(), DelayPolicy::RandomDefault);
            }
            other => panic!("expected Pscan, got {other:?}"),
        }
    }

    #[test]
    fn omitted_delay_flag_disables_delay() {
        let cli = Cli::parse_from(["rawrecon", "pscan", "10.0.0.1"]);
        match cli.command {
            Command::Pscan(args) => {
                assert_eq!(args.delay, None);
                assert_eq!(args.delay_policy().unwrap(), DelayPolicy::Disabled);
            }
            other => panic!("expected Pscan, got {other:?}"),
        }
    }

    #[test]
    fn netmap_takes_no_arguments() {
        let cli = Cli::parse_from(["rawrecon", "netmap"]);
        assert!(matches!(cli.command, Command::Netmap));
    }

    #[test]
    fn banner_parses_host_protocol_and_optional_port() {
        let cli = Cli::parse_from(["rawrecon", "banner", "example.com", "https", "-p", "8443"]);
        match cli.command {
            Command::Banner(args) => {
                assert_eq!(args.host, "example.com");
                assert_eq!(args.protocol, "https");
                assert_eq!(args.port, Some(8443));
            }
            other => panic!("expected Banner, got {other:?}"),
        }
    }

    #[test]
    fn resolve_port_spec_defaults_to_common_ports() {
        let args = PscanArgs {
            host: "10.0.0.1".to_string(),
            show: false,
            random: false,
            port: None,
            all: false,
            delay: None,
        };
        let spec = resolve_port_spec(&args).unwrap();
        assert_eq!(spec.len(), rawrecon_core::ports::COMMON_PORTS.len());
    }

    #[test]
    fn resolve_port_spec_honors_all_flag() {
        let args = PscanArgs {
            host: "10.0.0.1".to_string(),
            show: false,
            random: false,
            port: None,
            all: true,
            delay: None,
        };
        let spec = resolve_port_spec(&args).unwrap();
        assert_eq!(spec.len(), rawrecon_core::ports::all_ports().len());
    }

    #[test]
    fn parse_banner_protocol_rejects_unknown_names() {
        assert!(parse_banner_protocol("gopher").is_err());
        assert!(parse_banner_protocol("http").is_ok());
    }
}
