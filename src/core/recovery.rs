use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::factory::ConnectionFactory;
use crate::core::ring::HashRing;

/// Periodically re-probes disabled backends and re-enables the ones that
/// answer their liveness probe again.
///
/// A managed task rather than a fire-and-forget loop: it can be shut down
/// gracefully, a drop aborts it, and `run_pass` is callable directly so tests
/// drive recovery without depending on wall-clock timing.
pub struct RecoveryTask {
    handle: Option<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl RecoveryTask {
    /// Spawn the recovery loop, probing disabled servers every `interval`.
    pub fn spawn(ring: Arc<HashRing>, factory: Arc<ConnectionFactory>, interval: Duration) -> Self {
        let (shutdown, mut signal) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // An interval's first tick completes immediately; consume it so
            // the first pass runs one full interval after spawn.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => Self::run_pass(&ring, &factory).await,
                    _ = signal.changed() => break,
                }
            }
            debug!("recovery task stopped");
        });
        Self {
            handle: Some(handle),
            shutdown,
        }
    }

    /// One recovery pass: dial a throwaway probe to every disabled server and
    /// re-enable the ones whose probe succeeds. The probe is always closed,
    /// and the ring lock is never held while probing.
    pub async fn run_pass(ring: &HashRing, factory: &ConnectionFactory) {
        for (index, address) in ring.disabled_servers() {
            match factory.dial(&address, index).await {
                Ok(mut probe) => {
                    if probe.is_healthy().await {
                        ring.add(&address);
                        info!("server {} recovered, re-enabled on the ring", address);
                    } else {
                        debug!("server {} still failing its liveness probe", address);
                    }
                    probe.close().await;
                }
                Err(e) => debug!("server {} still unreachable: {}", address, e),
            }
        }
    }

    /// Signal the loop to stop and wait for it to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RecoveryTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
