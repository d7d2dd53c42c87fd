//! The pricing oracle egress collaborator (§6).
//!
//! Called once per terminal chunk. Must be safe to call concurrently —
//! the core treats it as thread-safe by contract, not something it
//! synchronizes itself (§5 "Shared resource policy"). Absence (`None`) is
//! allowed; failure is non-fatal and simply omits cost (§7 class 4).

use async_trait::async_trait;

use super::record::ConsolidatedRecord;

#[async_trait]
pub trait PricingOracle: Send + Sync {
    /// Compute the monetary cost of a completed response. `None` means
    /// the oracle could not price this record; the caller omits cost and
    /// proceeds, it never treats this as a hard failure.
    async fn cost_of(&self, record: &ConsolidatedRecord) -> Option<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::record::{Payload, Status, Usage};
    use crate::accumulator::chunk::TokenUsage;

    struct FlatRateOracle;

    #[async_trait]
    impl PricingOracle for FlatRateOracle {
        async fn cost_of(&self, _record: &ConsolidatedRecord) -> Option<f64> {
            Some(0.002)
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl PricingOracle for FailingOracle {
        async fn cost_of(&self, _record: &ConsolidatedRecord) -> Option<f64> {
            None
        }
    }

    fn sample_record() -> ConsolidatedRecord {
        ConsolidatedRecord {
            request_id: "req-1".into(),
            status: Status::Success,
            stream: true,
            start_timestamp: None,
            end_timestamp: None,
            latency_ms: 0,
            payload: Payload::Transcription { text: String::new() },
            tool_calls: vec![],
            usage: Some(Usage::Token(TokenUsage::default())),
            cost: None,
            cache_debug: None,
            error: None,
            object_tag: None,
            finish_reason: None,
            model: None,
            provider: None,
        }
    }

    #[tokio::test]
    async fn flat_rate_oracle_returns_cost() {
        let oracle = FlatRateOracle;
        assert_eq!(oracle.cost_of(&sample_record()).await, Some(0.002));
    }

    #[tokio::test]
    async fn failing_oracle_omits_cost() {
        let oracle = FailingOracle;
        assert_eq!(oracle.cost_of(&sample_record()).await, None);
    }
}
