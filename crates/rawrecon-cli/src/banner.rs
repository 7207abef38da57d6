//! Startup banner for the `rawrecon` binary.

use colored::Colorize;

/// Version and branding printed once at startup (not for the `banner`
/// subcommand's TCP/TLS grabbing — see [`crate::output`] for that).
pub struct Banner {
    version: String,
}

impl Banner {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
        }
    }

    pub fn print(&self) {
        println!("{}", self.ascii_art());
        println!(
            "  {} {}",
            "rawrecon".bright_cyan().bold(),
            self.version.bright_green()
        );
        println!(
            "  {}",
            "raw-packet TCP port scanning, host discovery, and banner grabbing"
                .bright_white()
        );
        println!();
    }

    pub fn print_compact(&self) {
        println!(
            "{} {}",
            "rawrecon".bright_cyan().bold(),
            self.version.bright_green()
        );
    }

    fn ascii_art(&self) -> String {
        let lines = [
            r" _ __ __ ___      _ __ ___  ___ ___  _ __ ",
            r"| '__/ _` \ \ /\ / / '__/ _ \/ __/ _ \| '_ \",
            r"| | | (_| |\ V  V /| | |  __/ (_| (_) | | | |",
            r"|_|  \__,_| \_/\_/ |_|  \___|\___\___/|_| |_|",
        ];
        lines
            .iter()
            .map(|l| l.bright_cyan().bold().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for Banner {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_stores_the_version_it_was_given() {
        let banner = Banner::new("1.2.3");
        assert_eq!(banner.version, "1.2.3");
    }

    #[test]
    fn ascii_art_is_non_empty_and_multiline() {
        let banner = Banner::new("0.1.0");
        let art = banner.ascii_art();
        assert!(!art.is_empty());
        assert!(art.lines().count() >= 4);
    }

    #[test]
    fn default_banner_uses_crate_version() {
        let banner = Banner::default();
        assert!(!banner.version.is_empty());
    }
}
