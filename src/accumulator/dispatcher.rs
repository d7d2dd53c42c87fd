//! The stream dispatcher (§4.4): the single entry point callers use.
//!
//! `process()` selects the kind's reducer, updates the per-request state,
//! and returns either a running-delta view (non-terminal) or the final
//! consolidated record (terminal), with terminal emission gated so only
//! one caller of the terminal chunk produces the final record (§4.4,
//! P1/P10).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::chunk::{Chunk, StreamKind};
use super::config::AccumulatorConfig;
use super::error::AccumulatorError;
use super::oracle::PricingOracle;
use super::pool::PoolSet;
use super::record::{ConsolidatedRecord, DeltaSnapshot, Status};
use super::reducers::{self, responses::deep_clone_event};
use super::registry::AccumulatorRegistry;

/// What `process()` returns: a running delta view, the authoritative
/// final record, or nothing (another caller already owns finalization).
pub enum Emission {
    Delta(DeltaSnapshot),
    Final(Box<ConsolidatedRecord>),
    None,
}

pub struct StreamDispatcher {
    pools: Arc<PoolSet>,
    registry: Arc<AccumulatorRegistry>,
    pricing_oracle: Option<Arc<dyn PricingOracle>>,
    shutting_down: AtomicBool,
}

impl StreamDispatcher {
    pub fn new(config: &AccumulatorConfig, pricing_oracle: Option<Arc<dyn PricingOracle>>) -> Self {
        Self {
            pools: Arc::new(PoolSet::new(config.chunk_pool_prewarm_size)),
            registry: Arc::new(AccumulatorRegistry::new()),
            pricing_oracle,
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn pools(&self) -> &Arc<PoolSet> {
        &self.pools
    }

    pub fn registry(&self) -> &Arc<AccumulatorRegistry> {
        &self.registry
    }

    /// Fix the start-timestamp before the first chunk arrives (§6
    /// Ingress). A no-op on the timestamp if the state already exists
    /// and has a start-timestamp (never backdates, §9).
    pub fn pre_create(
        &self,
        request_id: &str,
        start_timestamp: DateTime<Utc>,
    ) -> Result<(), AccumulatorError> {
        if request_id.is_empty() {
            return Err(AccumulatorError::MissingRequestId);
        }
        self.registry.get_or_create(request_id, start_timestamp);
        Ok(())
    }

    /// Explicit eviction, idempotent (§6 Ingress). Returns every held
    /// chunk to its pool before the state is dropped.
    pub fn cleanup(&self, request_id: &str) {
        if let Some(state) = self.registry.remove(request_id) {
            let drained = state.lock().drain_chunks();
            for chunk in drained {
                self.pools.release(chunk);
            }
        }
    }

    /// Stop accepting new chunks, drain every in-flight state back to its
    /// pool, and return once nothing remains (§6 Ingress, §5
    /// "Cancellation/timeouts").
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        let in_flight: Vec<String> = {
            // Collect ids first: `cleanup` removes from the registry
            // while iterating would otherwise race DashMap's shard locks.
            self.registry
                .iterate_expired(std::time::Duration::ZERO)
                .into_iter()
                .map(|s| s.request_id.clone())
                .collect()
        };
        for request_id in in_flight {
            self.cleanup(&request_id);
        }
        info!(remaining = self.registry.len(), "accumulator shutdown drained registry");
    }

    /// Process one normalized chunk for `request_id`. `chunk` is borrowed —
    /// the dispatcher copies its payload into a pooled chunk so the
    /// caller's buffer can be reused immediately after this call returns
    /// (§4.4 step 1, §6 "Normalized chunk shape").
    pub async fn process(
        &self,
        request_id: &str,
        chunk: &Chunk,
        terminal: bool,
    ) -> Result<Emission, AccumulatorError> {
        if request_id.is_empty() {
            return Err(AccumulatorError::MissingRequestId);
        }
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(AccumulatorError::ShutdownInProgress {
                request_id: request_id.to_string(),
            });
        }

        let kind = chunk.kind();
        let mut pooled = self.pools.acquire(kind);
        pooled.fill_from(chunk);
        if let Chunk::Responses { event, .. } = &mut pooled {
            *event = deep_clone_event(event);
        }

        let received_at = pooled.envelope().received_at.unwrap_or_else(Utc::now);
        let error = pooled.envelope().error.clone();
        let object_tag_hint = pooled.envelope().object_tag.clone();

        let state = self.registry.get_or_create(request_id, received_at);

        // Step 2: append under the lock, bookkeeping timestamps/object-tag,
        // and (if terminal) attempt to claim the completion flag in the
        // same critical section the append happened in. A terminal chunk
        // that loses the race (the state is already completed) must never
        // be appended — its payload would otherwise double up content the
        // winning caller's reducer run already folded (Invariant 4, §4
        // "Duplicate terminal arrivals are silently ignored after the
        // first"). Its pooled chunk is handed back below instead, once
        // the lock is released, so it still returns to circulation.
        let (claimed_terminal, rejected_chunk) = {
            let mut inner = state.lock();
            inner.set_start_if_unset(received_at);
            inner.record_object_tag_if_unset(object_tag_hint.as_deref());
            if terminal {
                if inner.completed {
                    (Some(false), Some(pooled))
                } else {
                    inner.append_chunk(pooled, kind);
                    inner.set_final_timestamp(received_at);
                    (Some(inner.claim_completion()), None)
                }
            } else {
                inner.append_chunk(pooled, kind);
                (None, None)
            }
        };
        if let Some(chunk) = rejected_chunk {
            self.pools.release(chunk);
        }

        match claimed_terminal {
            None => {
                // Non-terminal: fold under the lock, return a delta view.
                let inner = state.lock();
                let folded = reducers::fold(kind, &inner.chunks, error.as_ref());
                Ok(Emission::Delta(DeltaSnapshot {
                    request_id: request_id.to_string(),
                    payload: folded.payload,
                    finish_reason: folded.finish_reason,
                }))
            }
            Some(false) => {
                // Another caller already claimed finalization (P10).
                debug!(request_id, "duplicate terminal chunk ignored");
                Ok(Emission::None)
            }
            Some(true) => {
                // Reducer runs under the lock, reading the chunk list it
                // was just appended to (§4.4 step 4).
                let (start_timestamp, end_timestamp, stream_kind, object_tag, folded) = {
                    let inner = state.lock();
                    let stream_kind = inner.stream_kind.unwrap_or(kind);
                    let folded = reducers::fold(stream_kind, &inner.chunks, error.as_ref());
                    (
                        inner.start_timestamp,
                        inner.final_timestamp,
                        stream_kind,
                        inner.object_tag.clone(),
                        folded,
                    )
                };

                // Cleanup: pool return precedes registry removal, and
                // neither happens until the reducer above has finished
                // (§9 Open Question).
                let drained = state.lock().drain_chunks();
                for c in drained {
                    self.pools.release(c);
                }
                self.registry.remove(request_id);

                let status = ConsolidatedRecord::status_for(&error);
                let latency_ms = ConsolidatedRecord::latency_ms(start_timestamp, end_timestamp);

                let mut record = ConsolidatedRecord {
                    request_id: request_id.to_string(),
                    status,
                    stream: true,
                    start_timestamp,
                    end_timestamp,
                    latency_ms,
                    payload: folded.payload,
                    tool_calls: folded.tool_calls,
                    usage: folded.usage,
                    cost: folded.cost,
                    cache_debug: folded.cache_debug,
                    error,
                    object_tag,
                    finish_reason: folded.finish_reason,
                    model: None,
                    provider: None,
                };

                if let Some(oracle) = &self.pricing_oracle {
                    if let Some(cost) = oracle.cost_of(&record).await {
                        record.cost = Some(cost);
                    }
                }

                Ok(Emission::Final(Box::new(record)))
            }
        }
    }
}
