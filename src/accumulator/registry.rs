//! Accumulator registry (§4.3): a concurrent map from request-id to
//! per-request state.
//!
//! Backed by `dashmap::DashMap`, which shards its internal locking so
//! concurrent `get`/`get_or_create`/`remove` calls on different request-ids
//! don't contend — the same role `DashMap` plays anywhere else in this
//! codebase's stack it's declared for.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::state::PerRequestState;

/// Point-in-time registry size, exposed for the `/metrics` ambient
/// endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStats {
    pub in_flight: usize,
}

/// Concurrent map from request-id to its per-request state. A request-id
/// maps to at most one state at any instant (Invariant 1).
#[derive(Default)]
pub struct AccumulatorRegistry {
    states: DashMap<String, Arc<PerRequestState>>,
}

impl AccumulatorRegistry {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    /// Atomic insert-if-absent. Concurrent first-chunks (or a pre-create
    /// racing a first chunk) on the same request-id coalesce to the one
    /// state `DashMap::entry` hands back to every caller.
    pub fn get_or_create(&self, request_id: &str, first_seen: DateTime<Utc>) -> Arc<PerRequestState> {
        let state = self
            .states
            .entry(request_id.to_string())
            .or_insert_with(|| Arc::new(PerRequestState::new(request_id.to_string())))
            .clone();
        state.lock().set_start_if_unset(first_seen);
        state
    }

    pub fn get(&self, request_id: &str) -> Option<Arc<PerRequestState>> {
        self.states.get(request_id).map(|entry| entry.clone())
    }

    /// Idempotent removal; returns the removed state (if any) so the
    /// caller can drain its chunks back to the pool.
    pub fn remove(&self, request_id: &str) -> Option<Arc<PerRequestState>> {
        self.states.remove(request_id).map(|(_, state)| state)
    }

    /// States whose birth-timestamp is older than `ttl` as of `now`, for
    /// the TTL sweeper (§4.3, §4.6). Does not remove anything itself —
    /// the sweeper decides per-state whether it can safely evict.
    pub fn iterate_expired(&self, ttl: std::time::Duration) -> Vec<Arc<PerRequestState>> {
        let now = std::time::Instant::now();
        self.states
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.value().birth) >= ttl)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            in_flight: self.states.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_coalesces_to_one_state() {
        let registry = AccumulatorRegistry::new();
        let now = Utc::now();
        let a = registry.get_or_create("req-1", now);
        let b = registry.get_or_create("req-1", now);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = AccumulatorRegistry::new();
        registry.get_or_create("req-2", Utc::now());
        assert!(registry.remove("req-2").is_some());
        assert!(registry.remove("req-2").is_none());
        assert!(registry.get("req-2").is_none());
    }

    #[test]
    fn get_returns_none_for_unknown_id() {
        let registry = AccumulatorRegistry::new();
        assert!(registry.get("missing").is_none());
    }
}
