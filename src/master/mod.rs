//! # Master Components
//!
//! ## Coordinator ([`coordinator`])
//! Runs the connect / send / receive / terminate passes and computes the
//! estimate.
//!
//! ## Worker Link ([`link`])
//! One connection's protocol state machine.
//!
//! ## Report ([`report`])
//! Timing and error summary of a finished run.

pub mod coordinator;
pub mod link;
pub mod report;

pub use coordinator::{MasterCoordinator, RunOutcome};
pub use link::{LinkState, WorkerLink};
pub use report::RunReport;
