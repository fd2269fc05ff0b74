//! # Worker Link
//!
//! The master's handle on one worker connection. Each link walks the
//! protocol exactly once:
//!
//! ```text
//! Unconnected -> Connected -> QuotaSent -> ResultReceived -> Terminated -> Closed
//! ```
//!
//! Calling a step out of order is rejected with [`PiError::InvalidRun`].

use log::{debug, info};
use tokio::net::TcpStream;

use crate::common::config::{Endpoint, ReadinessConfig};
use crate::common::connection::LineConnection;
use crate::common::error::{PiError, Result};
use crate::common::protocol::{parse_count, Command};

/// Where a [`WorkerLink`] is in its single pass through the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unconnected,
    Connected,
    QuotaSent,
    ResultReceived,
    /// `END` written, socket not yet shut down
    Terminated,
    Closed,
}

/// One master-to-worker connection and the step it has reached.
///
/// A link is created per run and never reused; once it is `Closed` every
/// further call fails with [`PiError::InvalidRun`].
///
/// # Example
/// ```ignore
/// let mut link = WorkerLink::new("127.0.0.1:25545".parse()?);
/// link.connect(&ReadinessConfig::default()).await?;
/// link.send_quota(1_000_000).await?;
/// let inside = link.receive_result().await?;
/// link.terminate().await?;
/// ```
pub struct WorkerLink {
    endpoint: Endpoint,
    conn: Option<LineConnection>,
    state: LinkState,
    quota: u64,
}

impl WorkerLink {
    /// Create an `Unconnected` link. No I/O happens until [`connect`](Self::connect).
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            conn: None,
            state: LinkState::Unconnected,
            quota: 0,
        }
    }

    /// The worker address this link talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Current protocol step.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Open the connection, retrying refused attempts per `readiness`.
    ///
    /// Workers that are still starting up refuse connections; the backoff
    /// gives them time to bind. Once attempts run out the error is final.
    ///
    /// # Arguments
    /// * `readiness` - Attempt count and backoff bounds
    ///
    /// # Returns
    /// `Ok(())` with the link `Connected`, [`PiError::Connection`] once every
    /// attempt was refused, or [`PiError::InvalidRun`] if already connected.
    pub async fn connect(&mut self, readiness: &ReadinessConfig) -> Result<()> {
        self.expect(LinkState::Unconnected)?;

        let attempts = readiness.connect_attempts.max(1);
        let mut attempt = 1;
        let stream = loop {
            match TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port)).await {
                Ok(stream) => break stream,
                Err(e) if attempt < attempts => {
                    let wait = readiness.backoff(attempt);
                    debug!(
                        "Worker {} not ready ({}), retry {}/{} in {:?}",
                        self.endpoint,
                        e,
                        attempt,
                        attempts - 1,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(PiError::Connection {
                        endpoint: self.endpoint.clone(),
                        source: e,
                    })
                }
            }
        };

        info!("🤝 Connected to worker {}", self.endpoint);
        self.conn = Some(LineConnection::new(stream));
        self.state = LinkState::Connected;
        Ok(())
    }

    /// Write the sample quota as one protocol line.
    ///
    /// The quota is remembered so [`receive_result`](Self::receive_result)
    /// can reject impossible counts.
    ///
    /// # Returns
    /// [`PiError::InvalidRun`] unless the link is `Connected`, or the write error.
    pub async fn send_quota(&mut self, quota: u64) -> Result<()> {
        self.expect(LinkState::Connected)?;
        self.conn_mut()?.write_line(Command::Quota(quota)).await?;
        self.quota = quota;
        self.state = LinkState::QuotaSent;
        Ok(())
    }

    /// Block until the worker replies with its inside count.
    ///
    /// A count larger than the quota sent is a protocol violation.
    ///
    /// # Returns
    /// * `Ok(inside)` - the worker's count, link now `ResultReceived`
    /// * [`PiError::PrematureClose`] - the worker hung up before replying
    /// * [`PiError::ProtocolParse`] - the reply is not a count, or exceeds the quota
    pub async fn receive_result(&mut self) -> Result<u64> {
        self.expect(LinkState::QuotaSent)?;
        let line = self.conn_mut()?.read_line("result").await?;
        let inside = parse_count(&line)?;
        if inside > self.quota {
            return Err(PiError::ProtocolParse(format!(
                "worker {} reported {} inside for a quota of {}",
                self.endpoint, inside, self.quota
            )));
        }
        self.state = LinkState::ResultReceived;
        Ok(inside)
    }

    /// Send `END` and close the socket.
    ///
    /// Failures come back as [`PiError::Teardown`]; the link ends up
    /// `Closed` either way.
    pub async fn terminate(&mut self) -> Result<()> {
        self.expect(LinkState::ResultReceived)?;
        let mut conn = self.conn.take().ok_or_else(|| self.missing_conn())?;

        let sent = conn.write_line(Command::End).await;
        if sent.is_ok() {
            self.state = LinkState::Terminated;
        }
        let closed = conn.shutdown().await;
        drop(conn);
        self.state = LinkState::Closed;

        sent.and(closed).map_err(|e| self.teardown_error(e))
    }

    fn expect(&self, expected: LinkState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PiError::InvalidRun(format!(
                "link to {} is {:?}, expected {:?}",
                self.endpoint, self.state, expected
            )))
        }
    }

    fn conn_mut(&mut self) -> Result<&mut LineConnection> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => Err(PiError::InvalidRun(format!(
                "link to {} has no open connection",
                self.endpoint
            ))),
        }
    }

    /// Shut the write half so the next write fails with a broken pipe.
    #[cfg(test)]
    pub(crate) async fn shut_write_half(&mut self) -> Result<()> {
        self.conn_mut()?.shutdown().await
    }

    fn missing_conn(&self) -> PiError {
        PiError::InvalidRun(format!("link to {} has no open connection", self.endpoint))
    }

    fn teardown_error(&self, e: PiError) -> PiError {
        let source = match e {
            PiError::Io(io) => io,
            other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
        };
        PiError::Teardown {
            endpoint: self.endpoint.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    async fn local_listener() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, Endpoint::new("127.0.0.1", port))
    }

    #[tokio::test]
    async fn test_out_of_order_step_is_rejected() {
        let mut link = WorkerLink::new(Endpoint::new("127.0.0.1", 1));
        let err = link.send_quota(10).await.unwrap_err();
        assert!(matches!(err, PiError::InvalidRun(_)));
        assert_eq!(link.state(), LinkState::Unconnected);
    }

    #[tokio::test]
    async fn test_full_walk_through_states() {
        let (listener, endpoint) = local_listener().await;
        let peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            let mut line = String::new();
            socket.read_line(&mut line).await.unwrap();
            assert_eq!(line, "100\n");
            socket.write_all(b"77\n").await.unwrap();
            line.clear();
            socket.read_line(&mut line).await.unwrap();
            line
        });

        let mut link = WorkerLink::new(endpoint);
        link.connect(&ReadinessConfig::no_retry()).await.unwrap();
        assert_eq!(link.state(), LinkState::Connected);
        link.send_quota(100).await.unwrap();
        assert_eq!(link.state(), LinkState::QuotaSent);
        assert_eq!(link.receive_result().await.unwrap(), 77);
        assert_eq!(link.state(), LinkState::ResultReceived);
        link.terminate().await.unwrap();
        assert_eq!(link.state(), LinkState::Closed);

        assert_eq!(peer.await.unwrap(), "END\n");
    }

    #[tokio::test]
    async fn test_result_above_quota_is_rejected() {
        let (listener, endpoint) = local_listener().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            let mut line = String::new();
            socket.read_line(&mut line).await.unwrap();
            socket.write_all(b"11\n").await.unwrap();
            // Hold the socket open until the master hangs up
            let _ = socket.read_line(&mut line).await;
        });

        let mut link = WorkerLink::new(endpoint);
        link.connect(&ReadinessConfig::no_retry()).await.unwrap();
        link.send_quota(10).await.unwrap();
        let err = link.receive_result().await.unwrap_err();
        assert!(matches!(err, PiError::ProtocolParse(_)));
    }

    #[tokio::test]
    async fn test_connect_retries_until_worker_binds() {
        // Reserve a free port, release it, and bind it again a bit later
        let (listener, endpoint) = local_listener().await;
        drop(listener);

        let port = endpoint.port;
        let late_worker = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(150)).await;
            let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            let _ = listener.accept().await.unwrap();
        });

        let readiness = ReadinessConfig {
            connect_attempts: 20,
            initial_backoff_ms: 20,
            max_backoff_ms: 100,
        };
        let mut link = WorkerLink::new(endpoint);
        link.connect(&readiness).await.unwrap();
        assert_eq!(link.state(), LinkState::Connected);
        late_worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_terminate_on_broken_write_half_is_teardown() {
        let (listener, endpoint) = local_listener().await;
        let peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            let mut line = String::new();
            socket.read_line(&mut line).await.unwrap();
            socket.write_all(b"50\n").await.unwrap();
            let mut rest = String::new();
            tokio::io::AsyncReadExt::read_to_string(&mut socket, &mut rest)
                .await
                .unwrap();
            rest
        });

        let mut link = WorkerLink::new(endpoint.clone());
        link.connect(&ReadinessConfig::no_retry()).await.unwrap();
        link.send_quota(100).await.unwrap();
        assert_eq!(link.receive_result().await.unwrap(), 50);

        link.shut_write_half().await.unwrap();
        match link.terminate().await {
            Err(PiError::Teardown { endpoint: failed, .. }) => assert_eq!(failed, endpoint),
            other => panic!("expected a teardown error, got {:?}", other),
        }
        assert_eq!(link.state(), LinkState::Closed);

        // END never made it onto the wire
        assert_eq!(peer.await.unwrap(), "");
    }
}
