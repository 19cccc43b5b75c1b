use serde::{Deserialize, Serialize};

/// Cluster configuration consumed by the ring and the pool.
///
/// Treated as an immutable snapshot once a pool is constructed; the pool and
/// ring share it behind an `Arc` and never mutate it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Memcached backend addresses, in stable order. A server's position in
    /// this list is its index everywhere else in the crate.
    pub servers: Vec<String>,
    /// Connections dialed per backend at pool construction; also the capacity
    /// of each backend's free-list.
    #[serde(default = "default_initial_connections")]
    pub initial_connections: usize,
    /// Read deadline in milliseconds; 0 disables the deadline.
    #[serde(default)]
    pub read_timeout_ms: u64,
    /// Write deadline in milliseconds; 0 disables the deadline.
    #[serde(default)]
    pub write_timeout_ms: u64,
    /// TCP connect deadline in milliseconds; 0 disables the deadline.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// true: reroute to another backend when the selected one is unreachable;
    /// false: fail the request immediately.
    #[serde(default = "default_rehash")]
    pub rehash: bool,
    /// Virtual nodes generated per backend.
    #[serde(default = "default_replicas")]
    pub replicas: usize,
    /// Seconds between background probes of disabled backends.
    #[serde(default = "default_recovery_interval_secs")]
    pub recovery_interval_secs: u64,
}

// Default values for the cluster configuration
fn default_initial_connections() -> usize {
    15
}
fn default_connect_timeout_ms() -> u64 {
    1000
}
fn default_rehash() -> bool {
    true
}
fn default_replicas() -> usize {
    20
}
fn default_recovery_interval_secs() -> u64 {
    30
}

impl Config {
    /// Create a configuration for the given servers with default settings.
    pub fn new(servers: Vec<String>) -> Self {
        Self {
            servers,
            initial_connections: default_initial_connections(),
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            connect_timeout_ms: default_connect_timeout_ms(),
            rehash: default_rehash(),
            replicas: default_replicas(),
            recovery_interval_secs: default_recovery_interval_secs(),
        }
    }

    /// Load configuration from a YAML file
    pub async fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_yaml_str(&content)
    }

    /// Parse configuration from a YAML string (useful for testing)
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for common errors
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        if self.initial_connections == 0 {
            return Err(ConfigError::InvalidValue("initial_connections"));
        }
        if self.replicas == 0 {
            return Err(ConfigError::InvalidValue("replicas"));
        }
        if self.recovery_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("recovery_interval_secs"));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("no memcached servers configured")]
    NoServers,
    #[error("{0} must be greater than zero")]
    InvalidValue(&'static str),
}
