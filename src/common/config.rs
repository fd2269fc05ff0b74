//! # Configuration
//!
//! Master configuration structures and the TOML loader shared by both
//! binaries.
//!
//! ## Example TOML
//!
//! ```toml
//! [run]
//! total_samples = 16000000
//!
//! [readiness]
//! connect_attempts = 10
//! initial_backoff_ms = 50
//! max_backoff_ms = 1000
//!
//! [[workers]]
//! host = "127.0.0.1"
//! port = 25545
//!
//! [[workers]]
//! host = "127.0.0.1"
//! port = 25546
//! ```

use std::fmt;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Example
/// ```ignore
/// let config: MasterConfig = load_config("config/master.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config file {}", path))?;
    let config: T =
        toml::from_str(&content).with_context(|| format!("parsing config file {}", path))?;
    Ok(config)
}

/// Listening address of one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = String;

    /// Parse `host:port`; IPv6 hosts go in brackets (`[::1]:25545`).
    ///
    /// A host containing `:` is only accepted inside balanced brackets, so
    /// `::1:25545` and `[::1:25545` are rejected rather than guessed at.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (host, port) = match s.strip_prefix('[') {
            Some(rest) => rest
                .split_once("]:")
                .ok_or_else(|| format!("unbalanced brackets in {:?}", s))?,
            None => {
                let (host, port) = s
                    .rsplit_once(':')
                    .ok_or_else(|| format!("expected host:port, got {:?}", s))?;
                if host.contains(':') {
                    return Err(format!("IPv6 host must be bracketed in {:?}", s));
                }
                (host, port)
            }
        };
        if host.is_empty() {
            return Err(format!("missing host in {:?}", s));
        }
        if host.contains('[') || host.contains(']') {
            return Err(format!("stray bracket in host of {:?}", s));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port in {:?}: {}", s, e))?;
        Ok(Endpoint::new(host, port))
    }
}

/// Complete master configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasterConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    /// Ordered worker list; result order and quota order follow it.
    #[serde(default)]
    pub workers: Vec<Endpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Total number of Monte Carlo draws across all workers
    #[serde(default = "default_total_samples")]
    pub total_samples: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            total_samples: default_total_samples(),
        }
    }
}

/// Connect retry policy standing in for an explicit "worker ready" signal.
///
/// The connect phase tries each endpoint up to `connect_attempts` times,
/// doubling the wait between attempts from `initial_backoff_ms` up to
/// `max_backoff_ms`. With `connect_attempts = 1` the first refusal fails the
/// run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl ReadinessConfig {
    /// Fail on the first refused connect.
    pub fn no_retry() -> Self {
        Self {
            connect_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            connect_attempts: default_connect_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_total_samples() -> u64 {
    16_000_000
}

fn default_connect_attempts() -> u32 {
    10
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_max_backoff_ms() -> u64 {
    1_000
}
