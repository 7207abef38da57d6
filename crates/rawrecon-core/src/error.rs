//! Error taxonomy shared by every rawrecon crate
//!
//! Each variant corresponds to one failure category a probe run can encounter.
//! `Usage`, `Resolution`, `Privilege`, `Filter` and `Sniff` are fatal for the
//! current command; `Build` and `Send` are recovered locally by the caller;
//! `Dissect` is recovered silently (the dissector returns `None` rather than
//! ever constructing this variant, so it exists for completeness of the
//! taxonomy, not as something callers match on); `Interrupted` drives the
//! cancellation path; `Unexpected` wraps anything else, including stray I/O
//! errors that don't fit one of the named categories above.

use std::io;
use std::net::AddrParseError;
use thiserror::Error;

/// Result type alias used throughout rawrecon.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing subcommand, malformed port range, malformed delay spec, bad
    /// protocol name for `banner`.
    #[error("{0}")]
    Usage(String),

    /// Hostname could not be resolved to an IPv4 address.
    #[error("Unknown host: {0}")]
    Resolution(String),

    /// Raw socket or `AF_PACKET` refused by the kernel.
    #[error("Insufficient privileges: {0}")]
    Privilege(String),

    /// Header construction failure (address-parse, essentially).
    #[error("Failed to build packet: {0}")]
    Build(String),

    /// `sendto` failure on a specific probe. Non-fatal; the run continues.
    #[error("Send failed for {dst}: {source}")]
    Send { dst: String, source: io::Error },

    /// BPF compilation or attachment failure.
    #[error("Filter error: {0}")]
    Filter(String),

    /// Socket bind/recv failure or filter-attach rejection.
    #[error("Sniffer error: {0}")]
    Sniff(String),

    /// A captured frame could not be dissected. Recovered silently by the
    /// dissector (it returns `None` and the frame is dropped), so this
    /// variant is never constructed; it exists so the taxonomy is complete.
    #[error("Failed to dissect captured frame")]
    Dissect,

    /// External cancellation (e.g. SIGINT).
    #[error("Process stopped")]
    Interrupted,

    /// Catch-all, preserving the inner message for display.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Unexpected(err.to_string())
    }
}

impl From<AddrParseError> for Error {
    fn from(err: AddrParseError) -> Self {
        Error::Build(format!("invalid address: {err}"))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Usage(format!("invalid configuration: {err}"))
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Unexpected(format!("failed to serialize configuration: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_display_is_bare_message() {
        let err = Error::Usage("bad port spec".to_string());
        assert_eq!(err.to_string(), "bad port spec");
    }

    #[test]
    fn resolution_display_names_unknown_host() {
        let err = Error::Resolution("no-such-host.invalid".to_string());
        assert!(err.to_string().contains("Unknown host"));
    }

    #[test]
    fn interrupted_display_matches_process_stopped() {
        assert_eq!(Error::Interrupted.to_string(), "Process stopped");
    }

    #[test]
    fn io_error_converts_to_unexpected() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Unexpected(_)));
    }

    #[test]
    fn dissect_display_names_the_failure() {
        assert_eq!(Error::Dissect.to_string(), "Failed to dissect captured frame");
    }

    #[test]
    fn addr_parse_error_becomes_build_error() {
        let parse_err = "not-an-ip".parse::<std::net::IpAddr>().unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Build(_)));
    }
}
