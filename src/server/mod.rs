//! HTTP server exposing the accumulator's ambient endpoints.
//!
//! Chunk ingestion is not a transport this crate provides (see the
//! package-level docs) — a caller embeds [`crate::accumulator::StreamDispatcher`]
//! directly and calls `process()` from wherever its own provider adapters
//! receive chunks. This server only exposes operational visibility:
//!
//! - `GET /health`  — liveness probe
//! - `GET /metrics` — pool and registry snapshot

pub mod routes;

pub use routes::{app_router, AppState};
