//! Mock memcached backend for integration testing
//!
//! Answers `version` liveness probes line by line until shut down. Dropping
//! the mock (or calling `shutdown`) stops the accept loop and closes every
//! accepted socket, so pooled client connections observe EOF immediately.
//! That is how tests simulate a crashed backend.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

pub struct MockMemcached {
    addr: String,
    version_requests: Arc<AtomicUsize>,
    shutdown: watch::Sender<bool>,
}

impl MockMemcached {
    pub async fn start() -> Self {
        Self::bind("127.0.0.1:0").await
    }

    /// Bind to a specific address; lets recovery tests restart a backend on
    /// the port the pool already knows.
    pub async fn bind(bind_addr: &str) -> Self {
        let listener = TcpListener::bind(bind_addr).await.expect("bind mock server");
        let addr = listener.local_addr().unwrap().to_string();
        let version_requests = Arc::new(AtomicUsize::new(0));
        let (shutdown, signal) = watch::channel(false);

        let counter = Arc::clone(&version_requests);
        tokio::spawn(async move {
            let mut accept_signal = signal.clone();
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { break };
                        let counter = Arc::clone(&counter);
                        let mut conn_signal = signal.clone();
                        tokio::spawn(async move {
                            let _ = serve_connection(stream, counter, &mut conn_signal).await;
                        });
                    }
                    _ = accept_signal.changed() => break,
                }
            }
        });

        Self {
            addr,
            version_requests,
            shutdown,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Liveness probes answered so far.
    pub fn version_requests(&self) -> usize {
        self.version_requests.load(Ordering::SeqCst)
    }

    /// Stop the accept loop and close every open socket.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

async fn serve_connection(
    stream: TcpStream,
    counter: Arc<AtomicUsize>,
    shutdown: &mut watch::Receiver<bool>,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        tokio::select! {
            read = reader.read_line(&mut line) => {
                if read? == 0 {
                    break;
                }
                let response = match line.trim() {
                    "version" => {
                        counter.fetch_add(1, Ordering::SeqCst);
                        "VERSION 1.6.21-mock\r\n"
                    }
                    "quit" => break,
                    _ => "ERROR\r\n",
                };
                write_half.write_all(response.as_bytes()).await?;
            }
            _ = shutdown.changed() => break,
        }
    }

    Ok(())
}

/// An address with nothing listening on it.
pub async fn unreachable_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

/// Cluster config tuned for tests: small ring, short deadlines, and a
/// recovery interval long enough that the background task never fires on its
/// own mid-test.
pub fn test_config(servers: Vec<String>, initial_connections: usize) -> memring::Config {
    let mut config = memring::Config::new(servers);
    config.initial_connections = initial_connections;
    config.replicas = 8;
    config.read_timeout_ms = 2000;
    config.write_timeout_ms = 2000;
    config.recovery_interval_secs = 3600;
    config
}

/// Find a key the ring currently assigns to `server_index`.
pub fn key_owned_by(pool: &memring::ConnectionPool, server_index: usize) -> String {
    use memring::core::Pool;

    for i in 0..10_000 {
        let key = format!("owned-key-{i}");
        if pool.server_for(&key).unwrap() == server_index {
            return key;
        }
    }
    panic!("no key found for server {server_index}");
}
