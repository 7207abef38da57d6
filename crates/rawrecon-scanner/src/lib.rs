//! Scan orchestration: the Probe Engine (`pscan`/`netmap`) and the
//! out-of-scope `banner` TCP/TLS banner grabber.
//!
//! [`engine`] is the only module that touches raw sockets, BPF, or the
//! sniffer; [`banner_grabber`] deliberately stays on ordinary sockets, since
//! banner grabbing is not part of the probe-and-capture core.

pub mod banner_grabber;
pub mod engine;
pub mod progress;

pub use banner_grabber::{BannerGrabber, BannerParser, BannerProtocol};
pub use engine::{run_netmap, run_pscan, run_udp_probe, PscanOutcome};
pub use progress::SendProgress;
