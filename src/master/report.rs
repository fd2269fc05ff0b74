use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::coordinator::RunOutcome;

/// Summary of one run as printed by the master binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub estimate: f64,
    /// `|estimate - π| / π`
    pub relative_error: f64,
    pub total_samples: u64,
    pub samples_drawn: u64,
    pub quota: u64,
    pub workers: usize,
    pub results: Vec<u64>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new(outcome: &RunOutcome, elapsed: Duration) -> Self {
        Self {
            estimate: outcome.estimate,
            relative_error: relative_error(outcome.estimate),
            total_samples: outcome.total_samples,
            samples_drawn: outcome.samples_drawn(),
            quota: outcome.quota,
            workers: outcome.results.len(),
            results: outcome.results.clone(),
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// Multi-line human readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Pi : {}\nError: {}\nNtot: {}\nWorkers: {}\nQuota per worker: {}\nTime Duration (ms): {}",
            self.estimate,
            self.relative_error,
            self.total_samples,
            self.workers,
            self.quota,
            self.duration_ms
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub fn relative_error(estimate: f64) -> f64 {
    (estimate - std::f64::consts::PI).abs() / std::f64::consts::PI
}
