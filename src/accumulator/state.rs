//! Per-request accumulator state (§4.2).
//!
//! A pure data holder plus a mutex. Every mutable field lives inside
//! `Inner`, which is only reachable through `PerRequestState::lock()` — the
//! type has no unsynchronized accessor, so the compiler enforces "all
//! mutators hold the lock" rather than leaving it as a convention.

use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};

use super::chunk::{Chunk, StreamKind};

/// The mutable fields of a per-request state, reachable only while the
/// owning `PerRequestState`'s mutex is held.
pub struct Inner {
    pub stream_kind: Option<StreamKind>,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub final_timestamp: Option<DateTime<Utc>>,
    pub chunks: Vec<Chunk>,
    pub completed: bool,
    pub object_tag: Option<String>,
}

impl Inner {
    fn new() -> Self {
        Self {
            stream_kind: None,
            start_timestamp: None,
            final_timestamp: None,
            chunks: Vec::new(),
            completed: false,
            object_tag: None,
        }
    }

    /// Set the start timestamp on first use only — never backdate it from
    /// a later chunk (§9 Open Question: "set on first chunk only; do not
    /// backdate").
    pub fn set_start_if_unset(&mut self, at: DateTime<Utc>) {
        if self.start_timestamp.is_none() {
            self.start_timestamp = Some(at);
        }
    }

    /// Record the provider's object-tag the first time a chunk supplies a
    /// non-empty value (§3 Per-Request State).
    pub fn record_object_tag_if_unset(&mut self, tag: Option<&str>) {
        if self.object_tag.is_none() {
            if let Some(tag) = tag {
                if !tag.is_empty() {
                    self.object_tag = Some(tag.to_string());
                }
            }
        }
    }

    /// Append a chunk in arrival order (Invariant 2). Infallible — the
    /// spec treats allocation failure as upstream, not a condition this
    /// call handles (§4 "Failure semantics").
    pub fn append_chunk(&mut self, chunk: Chunk, kind: StreamKind) {
        if self.stream_kind.is_none() {
            self.stream_kind = Some(kind);
        }
        self.chunks.push(chunk);
    }

    pub fn set_final_timestamp(&mut self, at: DateTime<Utc>) {
        self.final_timestamp = Some(at);
    }

    /// Test-and-set the completion flag. Returns `true` if this call is
    /// the one that flipped it false→true (i.e. this caller owns
    /// finalization); `false` if another caller already claimed it
    /// (§4.4 step 4, P10).
    pub fn claim_completion(&mut self) -> bool {
        if self.completed {
            false
        } else {
            self.completed = true;
            true
        }
    }

    /// Drain the chunk list for cleanup, returning ownership so the caller
    /// can return each chunk to its pool. Leaves the state's own chunk
    /// list empty (Invariant 6: no further reads occur after this).
    pub fn drain_chunks(&mut self) -> Vec<Chunk> {
        std::mem::take(&mut self.chunks)
    }
}

/// Holds the ordered chunks of one in-flight stream plus lifecycle
/// timestamps, completion flag, and stream-kind metadata (§3).
pub struct PerRequestState {
    pub request_id: String,
    /// Monotonic creation time, used only by the TTL sweeper — never
    /// mutated, so it is safe to read without taking `inner`'s lock.
    pub birth: Instant,
    inner: Mutex<Inner>,
}

impl PerRequestState {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            birth: Instant::now(),
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Acquire the lock. Every mutation and every reducer read goes
    /// through this — there is no other way to reach `Inner`.
    pub fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock()
    }

    /// Non-blocking lock attempt for the TTL sweeper (§4.6): a state
    /// currently held by a live terminal-chunk finalization is skipped
    /// this tick rather than waited on.
    pub fn inner_try_lock(&self) -> Option<MutexGuard<'_, Inner>> {
        self.inner.try_lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_timestamp_set_once_and_never_backdated() {
        let state = PerRequestState::new("req-1".into());
        let first = Utc::now();
        let earlier = first - chrono::Duration::seconds(5);

        state.lock().set_start_if_unset(first);
        state.lock().set_start_if_unset(earlier);

        assert_eq!(state.lock().start_timestamp, Some(first));
    }

    #[test]
    fn claim_completion_is_true_exactly_once() {
        let state = PerRequestState::new("req-2".into());
        assert!(state.lock().claim_completion());
        assert!(!state.lock().claim_completion());
        assert!(!state.lock().claim_completion());
    }

    #[test]
    fn object_tag_recorded_once() {
        let state = PerRequestState::new("req-3".into());
        state.lock().record_object_tag_if_unset(Some("chat.completion"));
        state.lock().record_object_tag_if_unset(Some("something.else"));
        assert_eq!(state.lock().object_tag.as_deref(), Some("chat.completion"));
    }

    #[test]
    fn drain_empties_chunk_list() {
        let state = PerRequestState::new("req-4".into());
        state
            .lock()
            .append_chunk(Chunk::empty(StreamKind::ChatCompletion), StreamKind::ChatCompletion);
        let drained = state.lock().drain_chunks();
        assert_eq!(drained.len(), 1);
        assert!(state.lock().chunks.is_empty());
    }

    /// Pins down the dispatcher's check-then-append sequence (§4.4 step 2)
    /// deterministically: a terminal chunk that loses the completion race
    /// must never reach `chunks`, only the winner's append does.
    #[test]
    fn terminal_append_is_gated_by_already_completed_check() {
        let state = PerRequestState::new("req-5".into());

        {
            let mut inner = state.lock();
            assert!(!inner.completed);
            inner.append_chunk(Chunk::empty(StreamKind::ChatCompletion), StreamKind::ChatCompletion);
            assert!(inner.claim_completion());
        }

        {
            let mut inner = state.lock();
            if inner.completed {
                // loser: dispatcher skips append_chunk entirely here.
            } else {
                inner.append_chunk(Chunk::empty(StreamKind::ChatCompletion), StreamKind::ChatCompletion);
            }
        }

        assert_eq!(state.lock().chunks.len(), 1);
    }
}
