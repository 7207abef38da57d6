//! Banner grabbing over ordinary TCP/TLS sockets, out of scope for the
//! raw-packet core: `banner` never touches the sniffer or the BPF compiler.
//!
//! Each protocol handler opens a plain [`std::net::TcpStream`], speaks just
//! enough of that protocol's greeting to provoke a response, and reads back
//! whatever the server sends within the configured timeout. `https` wraps
//! the same connect step in a `native-tls` handshake before reading.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use rawrecon_core::error::{Error, Result};

/// The four protocols `banner` knows how to greet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerProtocol {
    Ftp,
    Ssh,
    Http,
    Https,
}

impl std::str::FromStr for BannerProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ftp" => Ok(BannerProtocol::Ftp),
            "ssh" => Ok(BannerProtocol::Ssh),
            "http" => Ok(BannerProtocol::Http),
            "https" => Ok(BannerProtocol::Https),
            other => Err(Error::Usage(format!("unsupported banner protocol: {other}"))),
        }
    }
}

/// Grabs a banner from one `(host, port)` with a fixed read budget.
pub struct BannerGrabber {
    timeout: Duration,
    max_banner_size: usize,
}

impl BannerGrabber {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_banner_size: 4096,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_max_banner_size(&mut self, size: usize) {
        self.max_banner_size = size;
    }

    /// Grab a banner for `protocol` from `target`.
    pub fn grab_banner(&self, target: SocketAddr, protocol: BannerProtocol) -> Result<String> {
        match protocol {
            BannerProtocol::Ftp => self.grab_ftp_banner(target),
            BannerProtocol::Ssh => self.grab_ssh_banner(target),
            BannerProtocol::Http => self.grab_http_banner(target),
            BannerProtocol::Https => self.grab_https_banner(target),
        }
    }

    fn connect(&self, target: SocketAddr) -> Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&target, self.timeout)
            .map_err(|e| Error::Send { dst: target.to_string(), source: e })?;
        stream.set_read_timeout(Some(self.timeout)).ok();
        stream.set_write_timeout(Some(self.timeout)).ok();
        Ok(stream)
    }

    /// FTP sends its `220` greeting as soon as the TCP handshake completes.
    fn grab_ftp_banner(&self, target: SocketAddr) -> Result<String> {
        let mut stream = self.connect(target)?;
        self.read_banner(&mut stream)
    }

    /// SSH sends its version string (`SSH-2.0-...`) immediately.
    fn grab_ssh_banner(&self, target: SocketAddr) -> Result<String> {
        let mut stream = self.connect(target)?;
        self.read_banner(&mut stream)
    }

    /// HTTP requires a request line before the server answers.
    fn grab_http_banner(&self, target: SocketAddr) -> Result<String> {
        let mut stream = self.connect(target)?;
        let request = format!(
            "GET / HTTP/1.0\r\nHost: {}\r\nUser-Agent: rawrecon/1.0\r\nConnection: close\r\n\r\n",
            target.ip()
        );
        stream
            .write_all(request.as_bytes())
            .map_err(|e| Error::Send { dst: target.to_string(), source: e })?;
        self.read_banner(&mut stream)
    }

    /// HTTPS: same request, over a `native-tls` session.
    fn grab_https_banner(&self, target: SocketAddr) -> Result<String> {
        let stream = self.connect(target)?;
        let connector = native_tls::TlsConnector::new()
            .map_err(|e| Error::Unexpected(format!("TLS connector setup failed: {e}")))?;
        let mut tls_stream = connector
            .connect(&target.ip().to_string(), stream)
            .map_err(|e| Error::Unexpected(format!("TLS handshake failed: {e}")))?;

        let request = format!(
            "GET / HTTP/1.0\r\nHost: {}\r\nUser-Agent: rawrecon/1.0\r\nConnection: close\r\n\r\n",
            target.ip()
        );
        tls_stream
            .write_all(request.as_bytes())
            .map_err(|e| Error::Send { dst: target.to_string(), source: e })?;

        let mut buffer = vec![0u8; self.max_banner_size];
        let n = tls_stream
            .read(&mut buffer)
            .map_err(|e| Error::Send { dst: target.to_string(), source: e })?;
        if n == 0 {
            return Err(Error::Unexpected("empty TLS response".to_string()));
        }
        Ok(String::from_utf8_lossy(&buffer[..n]).trim().to_string())
    }

    fn read_banner(&self, stream: &mut TcpStream) -> Result<String> {
        let mut buffer = vec![0u8; self.max_banner_size];
        let n = stream
            .read(&mut buffer)
            .map_err(|e| Error::Send { dst: stream.peer_addr().map(|a| a.to_string()).unwrap_or_default(), source: e })?;
        if n == 0 {
            return Err(Error::Unexpected("empty response".to_string()));
        }
        Ok(String::from_utf8_lossy(&buffer[..n]).trim().to_string())
    }
}

impl Default for BannerGrabber {
    fn default() -> Self {
        Self::new()
    }
}

/// Pulls a short, protocol-specific summary line out of a raw banner.
pub struct BannerParser;

impl BannerParser {
    pub fn parse_http_banner(banner: &str) -> Option<String> {
        banner
            .lines()
            .find(|line| line.starts_with("Server:"))
            .map(|line| line.strip_prefix("Server:").unwrap_or("").trim().to_string())
    }

    pub fn parse_ftp_banner(banner: &str) -> Option<String> {
        banner
            .starts_with("220")
            .then(|| banner.strip_prefix("220").unwrap_or("").trim().to_string())
    }

    pub fn parse_ssh_banner(banner: &str) -> Option<String> {
        banner.starts_with("SSH-").then(|| banner.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_parses_case_insensitively() {
        assert_eq!("HTTPS".parse::<BannerProtocol>().unwrap(), BannerProtocol::Https);
        assert_eq!("ftp".parse::<BannerProtocol>().unwrap(), BannerProtocol::Ftp);
    }

    #[test]
    fn unknown_protocol_is_a_usage_error() {
        assert!(matches!("gopher".parse::<BannerProtocol>(), Err(Error::Usage(_))));
    }

    #[test]
    fn parse_http_banner_extracts_server_header() {
        let banner = "HTTP/1.1 200 OK\r\nServer: nginx/1.18.0\r\nContent-Type: text/html\r\n";
        assert_eq!(BannerParser::parse_http_banner(banner), Some("nginx/1.18.0".to_string()));
    }

    #[test]
    fn parse_ftp_banner_strips_status_code() {
        let banner = "220 ProFTPD 1.3.5 Server ready.";
        assert_eq!(
            BannerParser::parse_ftp_banner(banner),
            Some("ProFTPD 1.3.5 Server ready.".to_string())
        );
    }

    #[test]
    fn parse_ssh_banner_passes_through_version_string() {
        let banner = "SSH-2.0-OpenSSH_8.2p1 Ubuntu-4ubuntu0.5";
        assert_eq!(BannerParser::parse_ssh_banner(banner), Some(banner.to_string()));
    }

    #[test]
    fn grabber_defaults_match_expected_budget() {
        let grabber = BannerGrabber::new();
        assert_eq!(grabber.timeout, Duration::from_secs(5));
        assert_eq!(grabber.max_banner_size, 4096);
    }

    #[test]
    fn connecting_to_a_closed_local_port_is_a_send_error() {
        // Port 1 is reliably closed/refused on loopback in CI sandboxes.
        let grabber = BannerGrabber::new();
        let target: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let result = grabber.grab_banner(target, BannerProtocol::Ftp);
        assert!(matches!(result, Err(Error::Send { .. })));
    }
}
