//! `rawrecon`: raw-packet TCP port scanning, host discovery, and banner grabbing.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use clap::Parser;

use rawrecon_cli::args::{self, BannerArgs, Cli, Command, PscanArgs};
use rawrecon_cli::banner::Banner;
use rawrecon_cli::{error_formatter, output};
use rawrecon_core::config::Config;
use rawrecon_core::error::{Error, Result};
use rawrecon_core::types::DelayPolicy;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = rawrecon_core::cancel::install_handler() {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler; interrupts will not exit cleanly");
    }

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("{}", error_formatter::format_error(&err));
        std::process::exit(error_formatter::exit_code(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    Banner::default().print_compact();

    // No `--config` flag exists yet, so the engine always runs against
    // built-in defaults; `Config` already carries the quiescence window and
    // default `--delay` bounds it would read from a file once that flag exists.
    let config = Config::default();

    match cli.command {
        Command::Pscan(args) => run_pscan(args, &config),
        Command::Netmap => run_netmap(&config),
        Command::Banner(args) => run_banner(args),
    }
}

fn run_pscan(args: PscanArgs, config: &Config) -> Result<()> {
    let target_ip = resolve_target(&args.host)?;
    let ports = args::resolve_port_spec(&args)?;
    let delay = args.delay_policy()?;

    let outcome = rawrecon_scanner::run_pscan(target_ip, &ports, delay, config)?;

    let show_all = args.show || config.output.show_all;
    output::print_pscan_results(&outcome.result, show_all);
    output::print_scan_summary(&outcome.summary);
    Ok(())
}

fn run_netmap(config: &Config) -> Result<()> {
    // `netmap` takes no flags: a probe burst across an entire /24 has no
    // use for an inter-probe delay the way a single-host `pscan` does.
    let hosts = rawrecon_scanner::run_netmap(DelayPolicy::Disabled, config)?;
    output::print_netmap_results(&hosts);
    Ok(())
}

fn run_banner(args: BannerArgs) -> Result<()> {
    let protocol = args::parse_banner_protocol(&args.protocol)?;
    let target_ip = resolve_target(&args.host)?;
    let port = args.resolved_port(protocol);

    let grabber = rawrecon_scanner::BannerGrabber::new();
    let banner = grabber.grab_banner(SocketAddr::new(target_ip, port), protocol)?;

    output::print_banner_text(&args.host, port, protocol, &banner);
    Ok(())
}

/// Resolve `host` (a literal IP or a DNS name) to its first IPv4 address.
fn resolve_target(host: &str) -> Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs = (host, 0u16)
        .to_socket_addrs()
        .map_err(|_| Error::Resolution(host.to_string()))?;

    addrs
        .map(|addr| addr.ip())
        .find(|ip| ip.is_ipv4())
        .ok_or_else(|| Error::Resolution(host.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_target_accepts_literal_ipv4() {
        assert_eq!(resolve_target("127.0.0.1").unwrap(), "127.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn resolve_target_rejects_bogus_hostnames() {
        let result = resolve_target("this-host-does-not-exist.invalid");
        assert!(matches!(result, Err(Error::Resolution(_))));
    }
}
