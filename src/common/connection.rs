//! # Line Connection
//!
//! Wraps a TCP stream with the newline framing used on every master/worker
//! connection.
//!
//! ## Wire Format
//!
//! ```text
//! [ASCII token] '\n'
//! ```
//!
//! A trailing `'\r'` is stripped on read. Lines longer than
//! [`MAX_LINE_LEN`] are rejected instead of being buffered without bound.

use std::fmt::Display;
use std::net::SocketAddr;

use log::debug;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::error::{PiError, Result};
use super::protocol::MAX_LINE_LEN;

/// TCP connection speaking the newline-delimited protocol.
pub struct LineConnection {
    stream: BufReader<TcpStream>,
}

impl LineConnection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.get_ref().peer_addr()
    }

    /// Read one line, without its terminator.
    ///
    /// `expected` names the token being waited for and only shows up in the
    /// [`PiError::PrematureClose`] raised when the stream ends first.
    ///
    /// # Errors
    /// - `PrematureClose`: end of stream before a complete line
    /// - `ProtocolParse`: over-long or non-UTF-8 line
    /// - `Io`: socket failure
    pub async fn read_line(&mut self, expected: &'static str) -> Result<String> {
        let mut buf = Vec::with_capacity(MAX_LINE_LEN);
        let n = (&mut self.stream)
            .take(MAX_LINE_LEN as u64)
            .read_until(b'\n', &mut buf)
            .await?;

        if n == 0 {
            return Err(PiError::PrematureClose { expected });
        }

        if buf.last() != Some(&b'\n') {
            if n >= MAX_LINE_LEN {
                return Err(PiError::ProtocolParse(format!(
                    "line exceeds {} bytes",
                    MAX_LINE_LEN
                )));
            }
            // Partial line followed by EOF
            return Err(PiError::PrematureClose { expected });
        }

        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }

        let line = String::from_utf8(buf)
            .map_err(|_| PiError::ProtocolParse("line is not valid UTF-8".to_string()))?;
        debug!("⬅️  {:?}", line);
        Ok(line)
    }

    /// Write `token` followed by a newline and flush immediately.
    pub async fn write_line<T: Display>(&mut self, token: T) -> Result<()> {
        let line = format!("{}\n", token);
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.flush().await?;
        debug!("➡️  {:?}", line.trim_end());
        Ok(())
    }

    /// Flush and shut down the write half; the socket closes when dropped.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
