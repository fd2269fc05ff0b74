#![allow(dead_code)]

use distributed_pi::{Endpoint, Worker};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub async fn bind_local() -> (TcpListener, Endpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, Endpoint::new("127.0.0.1", port))
}

/// A real worker running in-process on an ephemeral port.
pub async fn spawn_worker(
    seed: u64,
) -> (
    Endpoint,
    JoinHandle<distributed_pi::Result<distributed_pi::worker::ServeStats>>,
) {
    let (listener, endpoint) = bind_local().await;
    let handle = tokio::spawn(Worker::with_seed(seed).serve_listener(listener));
    (endpoint, handle)
}

/// Endpoint on which nothing listens.
pub async fn dead_endpoint() -> Endpoint {
    let (listener, endpoint) = bind_local().await;
    drop(listener);
    endpoint
}

/// Scripted worker: answers each quota line with `reply(quota)` and records
/// every line it receives until `END` or end of stream.
pub async fn fake_worker<F>(reply: F) -> (Endpoint, JoinHandle<Vec<String>>)
where
    F: Fn(u64) -> String + Send + 'static,
{
    let (listener, endpoint) = bind_local().await;
    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        // One connection per lifetime, like a real worker
        drop(listener);
        let mut socket = BufReader::new(socket);
        let mut received = Vec::new();
        loop {
            let mut line = String::new();
            match socket.read_line(&mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim_end().to_string();
            received.push(line.clone());
            if line == "END" {
                break;
            }
            if let Ok(quota) = line.parse::<u64>() {
                let answer = format!("{}\n", reply(quota));
                if socket.write_all(answer.as_bytes()).await.is_err() {
                    break;
                }
            }
        }
        received
    });
    (endpoint, handle)
}
