//! TTL sweeper (§4.6): a background periodic task that evicts per-request
//! state older than the configured TTL, reclaiming streams abandoned
//! before a terminal chunk ever arrived (client disconnect, dropped
//! connection, etc).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::pool::PoolSet;
use super::registry::AccumulatorRegistry;

/// Owns the periodic tick and the shutdown handshake. Built separately
/// from `StreamDispatcher` so a caller can hold the dispatcher's pools
/// and registry without also owning its background task.
pub struct TtlSweeper {
    registry: Arc<AccumulatorRegistry>,
    pools: Arc<PoolSet>,
    ttl: Duration,
    interval: Duration,
    stopping: Arc<AtomicBool>,
}

impl TtlSweeper {
    pub fn new(
        registry: Arc<AccumulatorRegistry>,
        pools: Arc<PoolSet>,
        ttl: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            pools,
            ttl,
            interval,
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    /// One scan-and-evict pass, exposed directly so tests don't need to
    /// wait on a real timer.
    pub fn sweep_once(&self) {
        let expired = self.registry.iterate_expired(self.ttl);
        let mut evicted = 0usize;

        for state in expired {
            // A state another dispatcher operation currently holds the
            // lock of is skipped and retried next tick, never evicted out
            // from under a live terminal-chunk finalization (§4.6).
            let Some(mut inner) = state.inner_try_lock() else {
                continue;
            };
            let drained = inner.drain_chunks();
            drop(inner);

            // The registry entry might already be gone if terminal
            // cleanup raced this tick — `remove` is idempotent either way.
            if self.registry.remove(&state.request_id).is_some() {
                evicted += 1;
            }
            for chunk in drained {
                self.pools.release(chunk);
            }
        }

        if evicted > 0 {
            info!(evicted, remaining = self.registry.len(), "ttl sweep evicted abandoned streams");
        } else {
            debug!(remaining = self.registry.len(), "ttl sweep found nothing to evict");
        }
    }

    /// Run the periodic loop until `stop()` is called. Intended to be
    /// spawned as its own tokio task; the caller awaits the returned
    /// `JoinHandle` after calling `stop()` to implement the shutdown
    /// barrier (§4.6 "A shutdown signal stops the sweeper and a barrier
    /// waits for its exit before pool destruction").
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.stopping.load(Ordering::Acquire) {
                break;
            }
            self.sweep_once();
        }
    }

    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::chunk::{Chunk, StreamKind};
    use std::time::Duration as StdDuration;

    #[test]
    fn sweep_evicts_state_past_ttl() {
        let registry = Arc::new(AccumulatorRegistry::new());
        let pools = Arc::new(PoolSet::new(0));

        let state = registry.get_or_create("req-1", chrono::Utc::now());
        state
            .lock()
            .append_chunk(Chunk::empty(StreamKind::ChatCompletion), StreamKind::ChatCompletion);

        let sweeper = TtlSweeper::new(registry.clone(), pools.clone(), StdDuration::ZERO, StdDuration::from_secs(60));
        sweeper.sweep_once();

        assert!(registry.get("req-1").is_none());
        assert_eq!(pools.pool(StreamKind::ChatCompletion).stats().available, 1);
    }

    #[test]
    fn sweep_leaves_fresh_state_alone() {
        let registry = Arc::new(AccumulatorRegistry::new());
        let pools = Arc::new(PoolSet::new(0));
        registry.get_or_create("req-2", chrono::Utc::now());

        let sweeper = TtlSweeper::new(
            registry.clone(),
            pools,
            StdDuration::from_secs(3600),
            StdDuration::from_secs(60),
        );
        sweeper.sweep_once();

        assert!(registry.get("req-2").is_some());
    }
}
