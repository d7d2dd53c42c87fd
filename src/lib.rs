//! # gateway-accumulator
//!
//! Consolidates a provider's streamed chunks (chat, text-completion,
//! speech, transcription, responses) into one authoritative record per
//! request. See [`accumulator`] for the module that does the work.

pub mod accumulator;
pub mod server;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
