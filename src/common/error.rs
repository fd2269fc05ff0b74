//! # Error Types
//!
//! Every failure the master or a worker can hit while running the protocol.
//! Anything except [`PiError::Teardown`] aborts the run it occurs in.

use thiserror::Error;

use super::config::Endpoint;

/// Library-wide result alias.
pub type Result<T> = std::result::Result<T, PiError>;

#[derive(Debug, Error)]
pub enum PiError {
    /// An endpoint was unreachable or refused the connection during the
    /// connect phase (after the readiness policy gave up).
    #[error("failed to connect to worker at {endpoint}: {source}")]
    Connection {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    /// A received line is not the integer or sentinel the protocol expects.
    #[error("protocol violation: {0}")]
    ProtocolParse(String),

    /// The peer closed the stream before sending the expected token.
    #[error("peer closed the connection while waiting for {expected}")]
    PrematureClose { expected: &'static str },

    /// Sending `END` or closing a connection after aggregation failed.
    /// Logged by the coordinator, never returned from a run.
    #[error("teardown of {endpoint} failed: {source}")]
    Teardown {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    /// Run preconditions do not hold (worker count, sample budget).
    #[error("invalid run: {0}")]
    InvalidRun(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking sampling task panicked or was cancelled.
    #[error("sampling task failed: {0}")]
    Sampling(#[from] tokio::task::JoinError),
}

impl PiError {
    /// True for errors caused by the remote side breaking the line protocol.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            PiError::ProtocolParse(_) | PiError::PrematureClose { .. }
        )
    }
}
