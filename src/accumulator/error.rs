//! Errors the accumulator surfaces to its caller.
//!
//! Only caller-contract violations and the shutdown race are ever returned
//! from `process()` (§7 classes 1 and 5); provider errors, tool-call
//! folding warnings, and pricing-oracle failures are not represented here —
//! they are data (the record's `error` field) or log output, never a
//! `Result::Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccumulatorError {
    #[error("request-id must not be empty")]
    MissingRequestId,

    #[error("unknown stream kind for request {request_id}")]
    UnknownStreamKind { request_id: String },

    #[error("accumulator is shutting down, chunk for {request_id} was not retained")]
    ShutdownInProgress { request_id: String },
}
