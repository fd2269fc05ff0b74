//! # Common Components
//!
//! Shared pieces used by both the master and the workers.
//!
//! ## Modules
//!
//! - [`protocol`]: wire tokens, constants and the estimate formula
//! - [`connection`]: TCP stream wrapper with newline framing
//! - [`config`]: endpoints, master configuration and the TOML loader
//! - [`error`]: the crate error type
//! - [`logging`]: `env_logger` setup for the binaries

pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod protocol;
