//! # Master Coordinator
//!
//! Drives one distributed estimation over a fixed, ordered list of workers.
//!
//! ## Run Phases
//!
//! Every phase is a full sequential pass over the endpoint list, and no
//! phase starts before the previous one finished for every worker:
//!
//! 1. **Connect** to each endpoint in order (readiness retry, then abort)
//! 2. **Send** `floor(total / W)` to each worker
//! 3. **Receive** each worker's inside count, in endpoint order
//! 4. **Aggregate** the counts
//! 5. **Terminate**: `END` to everyone, close sockets (errors only logged)
//!
//! Workers compute concurrently once their quota is out, but the receive pass
//! reads worker `i` before worker `i + 1` even if `i + 1` answers first.
//! There is no I/O timeout: a hung worker stalls the run.

use log::{info, warn};

use super::link::WorkerLink;
use crate::common::config::{Endpoint, MasterConfig, ReadinessConfig};
use crate::common::error::{PiError, Result};
use crate::common::protocol::{estimate_pi, quota_for, MAX_WORKERS};

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub estimate: f64,
    /// Budget requested by the caller (the estimate's denominator)
    pub total_samples: u64,
    /// Samples sent to each worker
    pub quota: u64,
    /// Inside counts in endpoint order
    pub results: Vec<u64>,
    /// Sum of `results`
    pub inside: u64,
}

impl RunOutcome {
    /// Samples actually drawn: `quota * W`, which is at most `total_samples`.
    pub fn samples_drawn(&self) -> u64 {
        self.quota * self.results.len() as u64
    }
}

/// Master side of the protocol.
///
/// Holds only the immutable run parameters; all connections are created and
/// owned by a single call to [`run`](Self::run), so separate runs never share
/// sockets.
pub struct MasterCoordinator {
    endpoints: Vec<Endpoint>,
    readiness: ReadinessConfig,
}

impl MasterCoordinator {
    /// Create a coordinator for an ordered endpoint list.
    ///
    /// Nothing is validated or connected here; [`run`](Self::run) checks the
    /// worker count against the sample budget.
    ///
    /// # Arguments
    /// * `endpoints` - Workers in the order they are connected and read
    /// * `readiness` - Connect retry policy applied to each endpoint
    pub fn new(endpoints: Vec<Endpoint>, readiness: ReadinessConfig) -> Self {
        Self {
            endpoints,
            readiness,
        }
    }

    /// Build from a loaded `master.toml`.
    pub fn from_config(config: &MasterConfig) -> Self {
        Self::new(config.workers.clone(), config.readiness.clone())
    }

    /// Workers in run order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Estimate π with `total_samples` draws spread over all workers.
    ///
    /// # Example
    /// ```ignore
    /// let master = MasterCoordinator::new(endpoints, ReadinessConfig::default());
    /// let pi = master.run(16_000_000).await?;
    /// ```
    pub async fn run(&self, total_samples: u64) -> Result<f64> {
        self.run_detailed(total_samples)
            .await
            .map(|outcome| outcome.estimate)
    }

    /// Same as [`run`](Self::run) but also returns per-worker results.
    ///
    /// # Returns
    /// The [`RunOutcome`] once every result is in. Connect, send and receive
    /// errors abort the run and drop all open links; teardown errors never do.
    ///
    /// # Errors
    /// * [`PiError::InvalidRun`] - no endpoints, more than [`MAX_WORKERS`], or
    ///   fewer samples than workers
    /// * [`PiError::Connection`] - an endpoint stayed unreachable
    /// * [`PiError::ProtocolParse`] / [`PiError::PrematureClose`] - a bad reply
    pub async fn run_detailed(&self, total_samples: u64) -> Result<RunOutcome> {
        self.validate(total_samples)?;

        let workers = self.endpoints.len();
        let quota = quota_for(total_samples, workers);
        info!(
            "🚀 Starting run: {} samples over {} worker(s), quota {}",
            total_samples, workers, quota
        );
        if quota * workers as u64 != total_samples {
            warn!(
                "⚠️  {} sample(s) of remainder will not be drawn",
                total_samples - quota * workers as u64
            );
        }

        // Phase 1: connect. Any failure drops the links opened so far.
        let mut links: Vec<WorkerLink> = Vec::with_capacity(workers);
        for endpoint in &self.endpoints {
            let mut link = WorkerLink::new(endpoint.clone());
            link.connect(&self.readiness).await?;
            links.push(link);
        }

        // Phase 2: send every quota before reading any result.
        for link in links.iter_mut() {
            link.send_quota(quota).await?;
        }
        info!("📤 Quota {} sent to {} worker(s)", quota, workers);

        // Phase 3: collect in endpoint order.
        let mut results = Vec::with_capacity(workers);
        for link in links.iter_mut() {
            let inside = link.receive_result().await?;
            info!("📥 Worker {} reported {}", link.endpoint(), inside);
            results.push(inside);
        }

        // Phase 4
        let inside: u64 = results.iter().sum();
        let estimate = estimate_pi(inside, total_samples);

        // Phase 5: the estimate stands whatever happens here.
        let failed = terminate_all(&mut links).await;
        if failed > 0 {
            warn!("⚠️  {} of {} teardown(s) failed", failed, workers);
        }

        info!("🏁 Run finished: {} inside, π ≈ {}", inside, estimate);
        Ok(RunOutcome {
            estimate,
            total_samples,
            quota,
            results,
            inside,
        })
    }

    fn validate(&self, total_samples: u64) -> Result<()> {
        let workers = self.endpoints.len();
        if workers == 0 {
            return Err(PiError::InvalidRun("no worker endpoints".to_string()));
        }
        if workers > MAX_WORKERS {
            return Err(PiError::InvalidRun(format!(
                "{} workers exceeds the maximum of {}",
                workers, MAX_WORKERS
            )));
        }
        if total_samples < workers as u64 {
            return Err(PiError::InvalidRun(format!(
                "total samples {} is smaller than the worker count {}",
                total_samples, workers
            )));
        }
        Ok(())
    }
}

/// Send `END` to every link in order and close it.
///
/// Teardown errors are logged and counted, never propagated.
///
/// # Returns
/// The number of links whose teardown failed.
async fn terminate_all(links: &mut [WorkerLink]) -> usize {
    let mut failed = 0;
    for link in links.iter_mut() {
        if let Err(e) = link.terminate().await {
            warn!("⚠️  {}", e);
            failed += 1;
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(n: usize) -> Vec<Endpoint> {
        (0..n)
            .map(|i| Endpoint::new("127.0.0.1", 25545 + i as u16))
            .collect()
    }

    #[tokio::test]
    async fn test_rejects_empty_endpoint_list() {
        let master = MasterCoordinator::new(Vec::new(), ReadinessConfig::no_retry());
        assert!(matches!(
            master.run(1_000).await,
            Err(PiError::InvalidRun(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_too_many_workers() {
        let master =
            MasterCoordinator::new(endpoints(MAX_WORKERS + 1), ReadinessConfig::no_retry());
        assert!(matches!(
            master.run(1_000_000).await,
            Err(PiError::InvalidRun(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_budget_below_worker_count() {
        let master = MasterCoordinator::new(endpoints(4), ReadinessConfig::no_retry());
        assert!(matches!(master.run(3).await, Err(PiError::InvalidRun(_))));
    }

    #[test]
    fn test_samples_drawn_excludes_remainder() {
        let outcome = RunOutcome {
            estimate: 0.0,
            total_samples: 10,
            quota: 3,
            results: vec![2, 3, 2],
            inside: 7,
        };
        assert_eq!(outcome.samples_drawn(), 9);
    }

    /// A link that has been through connect, quota and result; its peer
    /// returns whatever it reads after replying.
    async fn link_awaiting_teardown() -> (WorkerLink, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            let mut line = String::new();
            socket.read_line(&mut line).await.unwrap();
            socket.write_all(b"5\n").await.unwrap();
            let mut rest = String::new();
            socket.read_to_string(&mut rest).await.unwrap();
            rest
        });

        let mut link = WorkerLink::new(Endpoint::new("127.0.0.1", port));
        link.connect(&ReadinessConfig::no_retry()).await.unwrap();
        link.send_quota(10).await.unwrap();
        link.receive_result().await.unwrap();
        (link, peer)
    }

    #[tokio::test]
    async fn test_failed_teardown_is_counted_not_propagated() {
        let (mut broken, broken_peer) = link_awaiting_teardown().await;
        let (healthy, healthy_peer) = link_awaiting_teardown().await;
        broken.shut_write_half().await.unwrap();

        let mut links = vec![broken, healthy];
        assert_eq!(terminate_all(&mut links).await, 1);

        // The failure did not stop the pass: every link is closed and the
        // healthy worker still got its END
        assert!(links
            .iter()
            .all(|link| link.state() == crate::master::link::LinkState::Closed));
        assert_eq!(broken_peer.await.unwrap(), "");
        assert_eq!(healthy_peer.await.unwrap(), "END\n");
    }
}
