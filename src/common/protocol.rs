//! # Line Protocol
//!
//! The wire convention shared by master and workers. Each connection carries,
//! strictly in this order:
//!
//! ```text
//! master -> worker   <quota>\n
//! worker -> master   <inside-count>\n
//! master -> worker   END\n
//! ```
//!
//! Integers are ASCII decimal, unsigned, 64-bit. There is no framing beyond
//! the newline.

use std::fmt;

use super::error::{PiError, Result};

/// Reserved token telling a worker to close its connection and stop.
pub const END_SENTINEL: &str = "END";

/// Upper bound on the number of workers a single run may address.
pub const MAX_WORKERS: usize = 16;

/// Port a worker listens on when none is given.
pub const DEFAULT_WORKER_PORT: u16 = 25545;

/// Longest line either side will accept, newline included.
pub const MAX_LINE_LEN: usize = 64;

/// A token the master sends to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Draw this many samples and reply with the inside count.
    Quota(u64),
    /// Termination sentinel.
    End,
}

impl Command {
    /// Parse one line (without its terminator) received by a worker.
    pub fn parse(line: &str) -> Result<Self> {
        if line == END_SENTINEL {
            return Ok(Command::End);
        }
        parse_count(line).map(Command::Quota)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Quota(n) => write!(f, "{}", n),
            Command::End => f.write_str(END_SENTINEL),
        }
    }
}

/// Parse a non-negative decimal integer line.
///
/// Rejects signs, surrounding whitespace and empty lines so that both sides
/// agree on exactly one spelling per value.
pub fn parse_count(line: &str) -> Result<u64> {
    if line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PiError::ProtocolParse(format!(
            "expected a non-negative integer, got {:?}",
            line
        )));
    }
    line.parse::<u64>()
        .map_err(|e| PiError::ProtocolParse(format!("integer {:?} out of range: {}", line, e)))
}

/// Even split of the sample budget. The remainder is dropped, never
/// redistributed.
pub fn quota_for(total_samples: u64, workers: usize) -> u64 {
    total_samples / workers as u64
}

/// π estimate from the aggregated inside count.
///
/// Divides by the requested budget, not by `quota * workers`, so a budget
/// that does not split evenly biases the estimate slightly low.
pub fn estimate_pi(inside: u64, total_samples: u64) -> f64 {
    4.0 * inside as f64 / total_samples as f64
}
