//! Distributed Monte Carlo estimation of π over newline-delimited TCP.
//!
//! A [`MasterCoordinator`] splits a sample budget evenly across a fixed list
//! of [`Worker`]s, collects their inside-quarter-disk counts and turns the sum
//! into an estimate.

pub mod common;
pub mod master;
pub mod processing;
pub mod worker;

pub use common::config::{Endpoint, MasterConfig, ReadinessConfig};
pub use common::error::{PiError, Result};
pub use master::{MasterCoordinator, RunOutcome, RunReport};
pub use worker::Worker;
