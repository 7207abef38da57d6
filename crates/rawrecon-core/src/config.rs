//! Run-wide configuration.
//!
//! `pscan`/`netmap`/`banner`'s per-target knobs (host, ports, `--delay`) stay
//! on the CLI; `Config` carries the knobs that aren't per-probe — the
//! quiescence window and the default `--delay` bounds `rawrecon-scanner`'s
//! engine reads on every run. `rawrecon-cli` loads `Config::default()` since
//! nothing is read from disk by default, but the struct is
//! `serde`/`toml`-deserialisable exactly like the rest of the stack so that a
//! future `--config <path>` flag is a non-breaking addition rather than a
//! redesign.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            engine: EngineConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Usage(format!("failed to read config file {path:?}: {e}")))?;
        Self::load_from_str(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn load_from_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate invariants that aren't expressible in the type alone.
    pub fn validate(&self) -> Result<()> {
        if self.engine.quiescence_secs == 0 {
            return Err(Error::Usage(
                "engine.quiescence_secs must be greater than 0".to_string(),
            ));
        }
        if !(self.engine.default_delay_lo < self.engine.default_delay_hi) {
            return Err(Error::Usage(
                "engine.default_delay_lo must be less than engine.default_delay_hi".to_string(),
            ));
        }
        Ok(())
    }
}

/// Network-layer knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Interface to bind the sniffer to; `None` resolves to the default
    /// route's egress interface.
    #[serde(default)]
    pub interface: Option<String>,
}

/// Probe-engine knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds to keep capturing after the last probe is sent.
    #[serde(default = "default_quiescence_secs")]
    pub quiescence_secs: u64,
    /// Lower bound of the unbounded `--delay` random range.
    #[serde(default = "default_delay_lo")]
    pub default_delay_lo: f64,
    /// Upper bound of the unbounded `--delay` random range.
    #[serde(default = "default_delay_hi")]
    pub default_delay_hi: f64,
}

impl EngineConfig {
    /// The post-burst listen window: a 3-second quiescence window by default.
    pub fn quiescence(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.quiescence_secs)
    }

    /// `(lo, hi)` bounds [`crate::types::DelayPolicy::RandomDefault`] samples
    /// from.
    pub fn default_delay_bounds(&self) -> (f64, f64) {
        (self.default_delay_lo, self.default_delay_hi)
    }
}

fn default_quiescence_secs() -> u64 {
    3
}

fn default_delay_lo() -> f64 {
    0.5
}

fn default_delay_hi() -> f64 {
    2.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quiescence_secs: default_quiescence_secs(),
            default_delay_lo: default_delay_lo(),
            default_delay_hi: default_delay_hi(),
        }
    }
}

/// Output verbosity knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// `--show`: print every response class, not only `Opened`.
    #[serde(default)]
    pub show_all: bool,
}
