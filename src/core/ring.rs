//! Consistent-hash ring over the configured backends.
//!
//! Each enabled backend contributes `replicas` virtual nodes, hashed from
//! `"{address}#{ordinal}"` and kept in one vector sorted ascending by hash.
//! A key is routed to the server owning the first node whose hash is >= the
//! key's hash, wrapping to the smallest node past the top of the hash space.
//! Keeping many points per server means that disabling one backend only
//! remaps roughly 1/N of the key space onto the survivors.

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::Config;

/// One hashed point on the ring, representing one replica of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualNode {
    pub hash: u32,
    pub server_index: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum RingError {
    #[error("no backends available on the ring")]
    Empty,
}

/// CRC-32/IEEE over the key bytes, the hash the memcached ecosystem settled on.
pub fn hash_key(key: &str) -> u32 {
    crc32fast::hash(key.as_bytes())
}

struct RingState {
    nodes: Vec<VirtualNode>,
    enabled: Vec<bool>,
}

/// Concurrent ring mapping keys to backend indexes.
///
/// The server list and replica count are an immutable snapshot of the
/// configuration; only the node vector and per-server enabled flags change at
/// runtime, guarded by one read-write lock. Lookups take the shared lock so
/// concurrent routing decisions do not serialize; `add`/`remove` take the
/// exclusive lock. The lock is never held across an await point.
pub struct HashRing {
    servers: Vec<String>,
    replicas: usize,
    state: RwLock<RingState>,
}

impl HashRing {
    /// Create an empty ring for the configured servers. Servers join the ring
    /// through `add`, normally during pool construction.
    pub fn new(config: &Config) -> Self {
        Self {
            servers: config.servers.clone(),
            replicas: config.replicas,
            state: RwLock::new(RingState {
                nodes: Vec::with_capacity(config.servers.len() * config.replicas),
                enabled: vec![false; config.servers.len()],
            }),
        }
    }

    fn server_index(&self, address: &str) -> Option<usize> {
        self.servers.iter().position(|s| s == address)
    }

    fn replica_hashes<'a>(&'a self, address: &'a str) -> impl Iterator<Item = u32> + 'a {
        (0..self.replicas).map(move |ordinal| crc32fast::hash(format!("{address}#{ordinal}").as_bytes()))
    }

    /// Enable a server: insert its virtual nodes at their sorted positions.
    /// Idempotent; re-adding an enabled server never duplicates nodes.
    pub fn add(&self, address: &str) {
        let Some(index) = self.server_index(address) else {
            warn!("ignoring add for unknown server {}", address);
            return;
        };

        let mut state = self.state.write();
        if state.enabled[index] {
            return;
        }

        for hash in self.replica_hashes(address) {
            let node = VirtualNode {
                hash,
                server_index: index,
            };
            let at = state
                .nodes
                .partition_point(|n| (n.hash, n.server_index) < (hash, index));
            state.nodes.insert(at, node);
        }
        state.enabled[index] = true;
        debug!("enabled server {} ({} nodes on ring)", address, state.nodes.len());
    }

    /// Disable a server: delete its virtual nodes. No-op when already
    /// disabled. Matches on server index within equal-hash runs so a hash
    /// collision with another server never deletes a foreign node.
    pub fn remove(&self, address: &str) {
        let Some(index) = self.server_index(address) else {
            warn!("ignoring remove for unknown server {}", address);
            return;
        };

        let mut state = self.state.write();
        if !state.enabled[index] {
            return;
        }

        for hash in self.replica_hashes(address) {
            let mut at = state.nodes.partition_point(|n| n.hash < hash);
            while at < state.nodes.len() && state.nodes[at].hash == hash {
                if state.nodes[at].server_index == index {
                    state.nodes.remove(at);
                    break;
                }
                at += 1;
            }
        }
        state.enabled[index] = false;
        debug!("disabled server {} ({} nodes on ring)", address, state.nodes.len());
    }

    /// Resolve the backend owning `key`: the first node with hash >= the key
    /// hash, wrapping to the smallest node. Fails only when the ring is empty.
    pub fn lookup(&self, key: &str) -> Result<usize, RingError> {
        let state = self.state.read();
        if state.nodes.is_empty() {
            return Err(RingError::Empty);
        }

        let hash = hash_key(key);
        let at = state.nodes.partition_point(|n| n.hash < hash);
        let node = if at == state.nodes.len() {
            &state.nodes[0]
        } else {
            &state.nodes[at]
        };
        Ok(node.server_index)
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    /// Snapshot of the ring's nodes, sorted ascending by hash.
    pub fn virtual_nodes(&self) -> Vec<VirtualNode> {
        self.state.read().nodes.clone()
    }

    pub fn is_enabled(&self, server_index: usize) -> bool {
        self.state
            .read()
            .enabled
            .get(server_index)
            .copied()
            .unwrap_or(false)
    }

    /// Currently disabled servers with their stable indexes.
    pub fn disabled_servers(&self) -> Vec<(usize, String)> {
        let state = self.state.read();
        self.servers
            .iter()
            .enumerate()
            .filter(|(index, _)| !state.enabled[*index])
            .map(|(index, address)| (index, address.clone()))
            .collect()
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn address_of(&self, server_index: usize) -> Option<&str> {
        self.servers.get(server_index).map(String::as_str)
    }
}
