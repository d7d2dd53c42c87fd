//! Per-kind chunk pools (§4.1).
//!
//! One pool per `StreamKind`. Prewarmed at construction to avoid
//! allocation storms on traffic spikes; `release` is the single point of
//! truth for clearing a chunk's fields before it re-enters circulation
//! (Invariant 7) — reducers and the dispatcher never clear a chunk
//! themselves.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::chunk::{Chunk, StreamKind};

/// Point-in-time counters for one kind's pool, exposed for the `/metrics`
/// ambient endpoint and for test assertions (P2: no leakage).
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub available: usize,
    pub acquired_total: u64,
    pub released_total: u64,
}

/// A reusable supply of empty `Chunk` records for one `StreamKind`.
pub struct ChunkPool {
    kind: StreamKind,
    free: Mutex<Vec<Chunk>>,
    acquired_total: AtomicU64,
    released_total: AtomicU64,
}

impl ChunkPool {
    /// Build a pool prewarmed with `prewarm_size` empty records.
    pub fn new(kind: StreamKind, prewarm_size: usize) -> Self {
        let free = (0..prewarm_size).map(|_| Chunk::empty(kind)).collect();
        Self {
            kind,
            free: Mutex::new(free),
            acquired_total: AtomicU64::new(0),
            released_total: AtomicU64::new(0),
        }
    }

    /// Take a chunk from the pool, allocating a fresh one if the pool is
    /// currently exhausted. Acquiring for the wrong kind is a caller bug,
    /// not something this pool detects at runtime (§4.1).
    pub fn acquire(&self) -> Chunk {
        self.acquired_total.fetch_add(1, Ordering::Relaxed);
        let mut free = self.free.lock();
        free.pop().unwrap_or_else(|| {
            debug!(kind = ?self.kind, "chunk pool exhausted, allocating fresh record");
            Chunk::empty(self.kind)
        })
    }

    /// Return a chunk to the pool after zeroing every field.
    pub fn release(&self, mut chunk: Chunk) {
        chunk.reset();
        self.released_total.fetch_add(1, Ordering::Relaxed);
        self.free.lock().push(chunk);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            available: self.free.lock().len(),
            acquired_total: self.acquired_total.load(Ordering::Relaxed),
            released_total: self.released_total.load(Ordering::Relaxed),
        }
    }
}

/// The five kind-specific pools, constructed together so the dispatcher
/// and sweeper can hold one handle.
pub struct PoolSet {
    text_completion: ChunkPool,
    chat_completion: ChunkPool,
    speech: ChunkPool,
    transcription: ChunkPool,
    responses: ChunkPool,
}

impl PoolSet {
    pub fn new(prewarm_size: usize) -> Self {
        Self {
            text_completion: ChunkPool::new(StreamKind::TextCompletion, prewarm_size),
            chat_completion: ChunkPool::new(StreamKind::ChatCompletion, prewarm_size),
            speech: ChunkPool::new(StreamKind::Speech, prewarm_size),
            transcription: ChunkPool::new(StreamKind::Transcription, prewarm_size),
            responses: ChunkPool::new(StreamKind::Responses, prewarm_size),
        }
    }

    pub fn pool(&self, kind: StreamKind) -> &ChunkPool {
        match kind {
            StreamKind::TextCompletion => &self.text_completion,
            StreamKind::ChatCompletion => &self.chat_completion,
            StreamKind::Speech => &self.speech,
            StreamKind::Transcription => &self.transcription,
            StreamKind::Responses => &self.responses,
        }
    }

    pub fn acquire(&self, kind: StreamKind) -> Chunk {
        self.pool(kind).acquire()
    }

    pub fn release(&self, chunk: Chunk) {
        self.pool(chunk.kind()).release(chunk);
    }

    /// Snapshot of every kind's pool stats, keyed by kind.
    pub fn stats(&self) -> Vec<(StreamKind, PoolStats)> {
        StreamKind::ALL
            .iter()
            .map(|&kind| (kind, self.pool(kind).stats()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prewarm_fills_pool_to_requested_size() {
        let pool = ChunkPool::new(StreamKind::ChatCompletion, 10);
        assert_eq!(pool.stats().available, 10);
    }

    #[test]
    fn acquire_beyond_prewarm_allocates_fresh() {
        let pool = ChunkPool::new(StreamKind::Speech, 1);
        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(pool.stats().available, 0);
        assert_eq!(a.kind(), StreamKind::Speech);
        assert_eq!(b.kind(), StreamKind::Speech);
    }

    #[test]
    fn release_clears_and_returns_to_pool() {
        let pool = ChunkPool::new(StreamKind::ChatCompletion, 0);
        let mut chunk = pool.acquire();
        if let Chunk::ChatCompletion { delta, .. } = &mut chunk {
            delta.content_fragment = Some("leftover".into());
        }
        pool.release(chunk);

        let stats = pool.stats();
        assert_eq!(stats.available, 1);
        assert_eq!(stats.acquired_total, 1);
        assert_eq!(stats.released_total, 1);

        let reused = pool.acquire();
        if let Chunk::ChatCompletion { delta, .. } = reused {
            assert!(delta.content_fragment.is_none());
        } else {
            panic!("wrong kind");
        }
    }

    #[test]
    fn pool_set_routes_by_kind() {
        let set = PoolSet::new(2);
        let chunk = set.acquire(StreamKind::Transcription);
        assert_eq!(chunk.kind(), StreamKind::Transcription);
        set.release(chunk);
        let stats = set.stats();
        assert_eq!(stats.len(), 5);
    }
}
