//! Human-readable rendering of scan and discovery results.

use colored::Colorize;

use rawrecon_core::ports::describe_port;
use rawrecon_core::types::{FlagClass, HostResult, ScanSummary};
use rawrecon_scanner::{BannerParser, BannerProtocol};

/// Colorize a [`FlagClass`] label the way its meaning suggests: green for
/// open, red for closed/terminated, yellow for anything merely potential
/// or filtered.
fn colored_label(class: FlagClass) -> String {
    let label = class.label();
    match class {
        FlagClass::Opened => label.green().bold().to_string(),
        FlagClass::Closed | FlagClass::Terminated => label.red().to_string(),
        FlagClass::Potential | FlagClass::Filtered => label.yellow().to_string(),
    }
}

/// Print one `pscan` result line per port. `show_all` prints every
/// response class; otherwise only [`FlagClass::Opened`] ports are shown.
pub fn print_pscan_results(result: &HostResult, show_all: bool) {
    for (&port, &class) in &result.status_by_port {
        if !show_all && !matches!(class, FlagClass::Opened) {
            continue;
        }
        println!(
            "  {:<6} {:<20} {}",
            port,
            describe_port(port),
            colored_label(class)
        );
    }
}

pub fn print_scan_summary(summary: &ScanSummary) {
    println!("{}", summary.to_string().bold());
}

/// Print one line per host discovered by `netmap`.
pub fn print_netmap_results(hosts: &[HostResult]) {
    if hosts.is_empty() {
        println!("{}", "No hosts responded.".yellow());
        return;
    }

    for host in hosts {
        let ip = host
            .ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "?".to_string());
        let mac = host.mac.as_deref().unwrap_or("-");
        let mut protocols: Vec<&str> = host.protocols_seen.iter().copied().collect();
        protocols.sort_unstable();

        println!(
            "  {:<16} {:<18} {}",
            ip.bright_white().bold(),
            mac,
            protocols.join(",")
        );
    }
    println!("{}", format!("{} host(s) responded", hosts.len()).bold());
}

/// Print a grabbed banner, trimmed to a single printable block, followed by
/// the protocol-specific summary line [`BannerParser`] can pull out of it
/// (nothing is printed for that line if the banner doesn't match the
/// expected shape).
pub fn print_banner_text(host: &str, port: u16, protocol: BannerProtocol, banner: &str) {
    println!("{} {}:{}", "Banner from".bold(), host, port);
    println!("{banner}");

    let summary = match protocol {
        BannerProtocol::Http | BannerProtocol::Https => BannerParser::parse_http_banner(banner),
        BannerProtocol::Ftp => BannerParser::parse_ftp_banner(banner),
        BannerProtocol::Ssh => BannerParser::parse_ssh_banner(banner),
    };
    if let Some(summary) = summary {
        println!("{} {}", "Summary:".bold(), summary);
    }
}
