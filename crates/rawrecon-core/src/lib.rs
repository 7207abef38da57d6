//! Core types, error taxonomy, and configuration shared across rawrecon.
//!
//! # Examples
//!
//! ```
//! use rawrecon_core::ports::PortSpec;
//!
//! let ports = PortSpec::parse("80,443,8000-8002").unwrap();
//! assert_eq!(ports.len(), 5);
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod ports;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use ports::PortSpec;
pub use types::{CapturedResponse, DelayPolicy, FlagClass, HostResult, ProbeKind, ScanSummary};
