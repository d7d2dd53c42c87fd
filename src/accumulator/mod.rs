//! Streaming accumulator: consolidates a provider's streamed chunks into
//! one authoritative record per request, independent of how the chunks
//! arrived (§1 Overview).
//!
//! [`StreamDispatcher`] is the module's single entry point; everything
//! else here exists to support it or to be read back through `/metrics`.

pub mod chunk;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod oracle;
pub mod pool;
pub mod record;
pub mod reducers;
pub mod registry;
pub mod state;
pub mod sweeper;

pub use chunk::{Chunk, StreamKind};
pub use config::AccumulatorConfig;
pub use dispatcher::{Emission, StreamDispatcher};
pub use error::AccumulatorError;
pub use oracle::PricingOracle;
pub use pool::{PoolSet, PoolStats};
pub use record::{ConsolidatedRecord, DeltaSnapshot};
pub use registry::{AccumulatorRegistry, RegistryStats};
pub use sweeper::TtlSweeper;
