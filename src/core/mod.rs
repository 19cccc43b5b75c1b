pub mod connection;
pub mod factory;
pub mod metrics;
pub mod pool;
pub mod recovery;
pub mod ring;

// Re-export core types
pub use connection::{Connection, ConnectionError, Timeouts};
pub use factory::{ConnectionFactory, DialError};
pub use metrics::{MetricsSnapshot, PoolMetrics};
pub use pool::{ConnectionPool, Pool, PoolError};
pub use recovery::RecoveryTask;
pub use ring::{HashRing, RingError, VirtualNode};
