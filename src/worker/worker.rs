//! # Worker - Monte Carlo Sample Server
//!
//! A worker is purely reactive. It listens on one port, accepts exactly one
//! connection for its whole lifetime and answers every quota with the number
//! of sampled points that fell inside the unit quarter-disk, until the master
//! sends `END`.
//!
//! ## State Machine
//!
//! ```text
//! Listening -> Accepted -> AwaitingToken -+-> Computing -> AwaitingToken
//!                                         +-> Closed
//! ```
//!
//! Every transition goes through [`Worker`]'s internal `advance`, which
//! rejects edges not in the diagram. The path taken is returned to the
//! caller in [`ServeStats::states`]. Any state may drop straight to
//! `Closed` when the session fails.
//!
//! A malformed token or an end-of-stream without `END` tears the connection
//! down and makes [`Worker::serve`] return the error.

use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::TcpListener;

use crate::common::connection::LineConnection;
use crate::common::error::{PiError, Result};
use crate::common::protocol::Command;
use crate::processing::monte_carlo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Listening,
    Accepted,
    AwaitingToken,
    Computing,
    Closed,
}

impl WorkerState {
    /// Whether the worker may move from `self` to `next`.
    pub fn can_advance_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Listening, Accepted)
                | (Accepted, AwaitingToken)
                | (AwaitingToken, Computing)
                | (Computing, AwaitingToken)
                | (Listening | Accepted | AwaitingToken | Computing, Closed)
        )
    }
}

/// What a worker did during its single connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeStats {
    /// Number of quota tokens answered
    pub quotas_served: u64,
    /// Sum of all quotas drawn
    pub samples_drawn: u64,
    /// Sum of all inside counts replied
    pub inside_reported: u64,
    /// Every state the worker passed through, starting at `Listening`
    pub states: Vec<WorkerState>,
}

/// Single-use Monte Carlo worker.
///
/// Owns its sampling stream exclusively. [`serve`](Self::serve) and
/// [`serve_listener`](Self::serve_listener) consume the worker, so it can
/// never serve a second connection.
pub struct Worker {
    /// Sampling stream, owned exclusively by this worker
    rng: StdRng,
    /// Current position in the state machine
    state: WorkerState,
    /// States visited so far, handed back in [`ServeStats::states`]
    trace: Vec<WorkerState>,
}

impl Worker {
    /// Worker seeded from OS entropy.
    ///
    /// # Example
    /// ```ignore
    /// let stats = Worker::new().serve("0.0.0.0", 25545).await?;
    /// ```
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Worker with a reproducible sampling stream.
    ///
    /// # Arguments
    /// - `seed`: seed for the `StdRng` behind every quota; two workers with
    ///   the same seed reply the same counts to the same quotas
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            state: WorkerState::Listening,
            trace: vec![WorkerState::Listening],
        }
    }

    /// Bind `host:port` and serve one connection until `END`.
    ///
    /// # Arguments
    /// - `host`: interface to bind (e.g. `"0.0.0.0"`)
    /// - `port`: port to listen on
    ///
    /// # Returns
    /// - `Ok(ServeStats)`: the master sent `END`
    /// - `Err`: bind/accept failure, malformed token, or end of stream
    ///   without `END`
    ///
    /// # Example
    /// ```ignore
    /// Worker::new().serve("0.0.0.0", 25545).await?;
    /// ```
    pub async fn serve(self, host: &str, port: u16) -> Result<ServeStats> {
        let listener = TcpListener::bind((host, port)).await?;
        info!("📡 Worker listening on {}", listener.local_addr()?);
        self.serve_listener(listener).await
    }

    /// Serve one connection accepted from an already bound listener.
    ///
    /// The listener is dropped right after the first accept, so any further
    /// connection attempt on that port is refused. Binding first lets a
    /// caller learn the address (port 0) before the master starts.
    ///
    /// # Returns
    /// Same as [`serve`](Self::serve).
    pub async fn serve_listener(mut self, listener: TcpListener) -> Result<ServeStats> {
        let (socket, addr) = listener.accept().await?;
        drop(listener);

        self.advance(WorkerState::Accepted)?;
        info!("🔗 Worker accepted master connection from {}", addr);

        let mut conn = LineConnection::new(socket);
        let outcome = self.handle_connection(&mut conn).await;

        if let Err(e) = conn.shutdown().await {
            debug!("Shutdown after session: {}", e);
        }
        self.close();

        match outcome {
            Ok(mut stats) => {
                info!(
                    "👋 Worker closing after {} quota(s), {} samples",
                    stats.quotas_served, stats.samples_drawn
                );
                stats.states = std::mem::take(&mut self.trace);
                Ok(stats)
            }
            Err(e) => {
                error!("❌ Worker session aborted: {}", e);
                Err(e)
            }
        }
    }

    /// Token-read loop on the accepted connection.
    async fn handle_connection(&mut self, conn: &mut LineConnection) -> Result<ServeStats> {
        let mut stats = ServeStats::default();

        loop {
            self.advance(WorkerState::AwaitingToken)?;
            let line = conn.read_line("quota or END").await?;

            match Command::parse(&line)? {
                Command::Quota(quota) => {
                    info!("🎯 Worker received quota = {}", quota);
                    self.advance(WorkerState::Computing)?;
                    let inside = self.compute(quota).await?;
                    conn.write_line(inside).await?;

                    stats.quotas_served += 1;
                    stats.samples_drawn += quota;
                    stats.inside_reported += inside;
                    info!("✅ Worker replied {} inside of {}", inside, quota);
                }
                Command::End => {
                    info!("🛑 Worker received END");
                    return Ok(stats);
                }
            }
        }
    }

    fn advance(&mut self, next: WorkerState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(PiError::InvalidRun(format!(
                "worker cannot move from {:?} to {:?}",
                self.state, next
            )));
        }
        self.state = next;
        self.trace.push(next);
        Ok(())
    }

    fn close(&mut self) {
        if self.state != WorkerState::Closed {
            self.state = WorkerState::Closed;
            self.trace.push(WorkerState::Closed);
        }
    }

    /// Run the sampling loop on the blocking pool; sampling is CPU-bound.
    async fn compute(&mut self, quota: u64) -> Result<u64> {
        let mut rng = self.rng.clone();
        let (rng, inside) = tokio::task::spawn_blocking(move || {
            let inside = monte_carlo::count_inside(&mut rng, quota);
            (rng, inside)
        })
        .await
        .map_err(PiError::Sampling)?;
        self.rng = rng;
        Ok(inside)
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}
