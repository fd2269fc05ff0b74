//! # Worker Components
//!
//! The worker side of the protocol: a single-connection server that draws
//! Monte Carlo samples on request. The sampling itself lives in
//! [`crate::processing::monte_carlo`].

pub mod worker;

pub use worker::{ServeStats, Worker, WorkerState};
