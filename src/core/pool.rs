use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crossbeam::queue::ArrayQueue;
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::core::connection::Connection;
use crate::core::factory::{ConnectionFactory, DialError};
use crate::core::metrics::{MetricsSnapshot, PoolMetrics};
use crate::core::recovery::RecoveryTask;
use crate::core::ring::{HashRing, RingError};

/// The two-call contract the protocol layer consumes: check a connection out
/// for a key, give it back when done. `server_for` lets batch operations
/// group keys by destination backend before issuing grouped requests.
#[async_trait]
pub trait Pool: Send + Sync {
    /// Check out a validated connection to the backend that owns `key`.
    async fn get(&self, key: &str) -> Result<Connection, PoolError>;

    /// Return a connection to its backend's free-list.
    fn release(&self, conn: Connection);

    /// Resolve the backend owning `key` without checking out a connection.
    fn server_for(&self, key: &str) -> Result<usize, PoolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Routing(#[from] RingError),
    #[error("pool warm-up failed: {0}")]
    Dial(#[from] DialError),
    #[error("backend {address} is unavailable and rehashing is disabled")]
    Unavailable { address: String },
    #[error("all backends exhausted after {attempts} attempts")]
    Exhausted { attempts: usize },
}

/// One bounded free-list of reusable connections per configured backend.
///
/// Checkout never blocks on pool availability: it reuses, dials, or fails
/// fast after bounded retries. Overload shows up as extra dialed connections,
/// never as queued callers. A connection taken from queue i always goes back
/// to queue i; the connection carries its index.
pub struct ConnectionPool {
    queues: Vec<ArrayQueue<Connection>>,
    config: Arc<Config>,
    factory: Arc<ConnectionFactory>,
    ring: Arc<HashRing>,
    metrics: Arc<PoolMetrics>,
    recovery: RecoveryTask,
}

impl ConnectionPool {
    /// Build the pool: dial `initial_connections` per backend (all servers
    /// warmed concurrently), enable every server on the ring, and start the
    /// recovery task. Any warm-up dial failure fails construction entirely,
    /// leaving no partial pool running.
    pub async fn new(config: Config) -> Result<Self, PoolError> {
        config.validate()?;

        let config = Arc::new(config);
        let factory = Arc::new(ConnectionFactory::new(&config));
        let ring = Arc::new(HashRing::new(&config));

        let queues: Vec<ArrayQueue<Connection>> = config
            .servers
            .iter()
            .map(|_| ArrayQueue::new(config.initial_connections))
            .collect();

        let warmups = config.servers.iter().enumerate().map(|(index, address)| {
            let factory = Arc::clone(&factory);
            let queue = &queues[index];
            let initial = config.initial_connections;
            async move {
                for _ in 0..initial {
                    let conn = factory.dial(address, index).await?;
                    let _ = queue.push(conn);
                }
                Ok::<(), DialError>(())
            }
        });
        try_join_all(warmups).await?;

        for address in &config.servers {
            ring.add(address);
        }

        info!(
            "pool ready: {} backends, {} connections each",
            config.servers.len(),
            config.initial_connections
        );

        let recovery = RecoveryTask::spawn(
            Arc::clone(&ring),
            Arc::clone(&factory),
            Duration::from_secs(config.recovery_interval_secs),
        );

        Ok(Self {
            queues,
            config,
            factory,
            ring,
            metrics: Arc::new(PoolMetrics::default()),
            recovery,
        })
    }

    /// Idle connections currently parked for a backend.
    pub fn idle_connections(&self, server_index: usize) -> usize {
        self.queues.get(server_index).map(ArrayQueue::len).unwrap_or(0)
    }

    pub fn ring(&self) -> &Arc<HashRing> {
        &self.ring
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Stop the recovery task and close every pooled connection.
    pub async fn shutdown(self) {
        self.recovery.shutdown().await;
        for queue in &self.queues {
            while let Some(mut conn) = queue.pop() {
                conn.close().await;
            }
        }
    }

    /// Disable a backend and close whatever it still has pooled.
    async fn quarantine(&self, index: usize) {
        self.ring.remove(&self.config.servers[index]);
        self.drain(index).await;
    }

    async fn drain(&self, index: usize) {
        let mut drained = 0;
        while let Some(mut conn) = self.queues[index].pop() {
            conn.close().await;
            drained += 1;
        }
        if drained > 0 {
            debug!(
                "closed {} stale connections for {}",
                drained, self.config.servers[index]
            );
        }
    }
}

#[async_trait]
impl Pool for ConnectionPool {
    /// Route `key` through the ring, reuse or dial a connection for the owning
    /// backend, and validate it with a liveness probe. An unhealthy backend is
    /// disabled and, when rehashing is enabled, the lookup repeats against the
    /// shrunken ring, at most once per configured server so checkout
    /// terminates even with the whole cluster down.
    async fn get(&self, key: &str) -> Result<Connection, PoolError> {
        let attempts = self.config.servers.len();

        for _ in 0..attempts {
            let index = self.ring.lookup(key)?;
            let address = &self.config.servers[index];

            let mut conn = match self.queues[index].pop() {
                Some(conn) => {
                    self.metrics.record_reuse();
                    conn
                }
                None => match self.factory.dial(address, index).await {
                    Ok(conn) => {
                        self.metrics.record_dial();
                        conn
                    }
                    Err(e) => {
                        self.metrics.record_dial_failure();
                        warn!("dial to {} failed: {}", address, e);
                        self.quarantine(index).await;
                        if !self.config.rehash {
                            return Err(PoolError::Unavailable {
                                address: address.clone(),
                            });
                        }
                        continue;
                    }
                },
            };

            if conn.is_healthy().await {
                return Ok(conn);
            }

            self.metrics.record_failed_health_check();
            warn!("backend {} failed its liveness probe, disabling", address);
            conn.close().await;
            self.quarantine(index).await;
            if !self.config.rehash {
                return Err(PoolError::Unavailable {
                    address: address.clone(),
                });
            }
        }

        Err(PoolError::Exhausted { attempts })
    }

    /// Non-blocking: park the connection back on its backend's free-list, or
    /// close it off the caller's path when the list is full. Already-closed
    /// connections are dropped.
    fn release(&self, conn: Connection) {
        if conn.is_closed() {
            return;
        }
        let index = conn.server_index();
        if let Err(mut conn) = self.queues[index].push(conn) {
            self.metrics.record_eviction();
            tokio::spawn(async move { conn.close().await });
        }
    }

    fn server_for(&self, key: &str) -> Result<usize, PoolError> {
        Ok(self.ring.lookup(key)?)
    }
}
