//! Recognized configuration options (§6 "Configuration").

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_prewarm_size() -> usize {
    1_000
}

fn default_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

/// Tunables for the chunk pools, the TTL sweeper, and nothing else — the
/// `pricing-oracle` and `logger` options from §6 are Rust handles
/// (`Option<Arc<dyn PricingOracle>>`, `tracing`) rather than config fields
/// and are supplied directly to the constructors that need them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatorConfig {
    /// Initial capacity prewarmed into each of the five chunk pools.
    #[serde(default = "default_prewarm_size")]
    pub chunk_pool_prewarm_size: usize,

    /// Abandoned-stream reclamation horizon.
    #[serde(with = "duration_secs", default = "default_ttl")]
    pub state_ttl: Duration,

    /// Frequency of the TTL sweeper's scan.
    #[serde(with = "duration_secs", default = "default_sweep_interval")]
    pub sweep_interval: Duration,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            chunk_pool_prewarm_size: default_prewarm_size(),
            state_ttl: default_ttl(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl AccumulatorConfig {
    /// Read overrides from environment variables, following the
    /// `std::env::var(...).unwrap_or_else(...)` convention used in
    /// `src/bin/server.rs`. Malformed values fall back to the default
    /// rather than failing startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("ACCUMULATOR_CHUNK_POOL_PREWARM_SIZE") {
            if let Ok(parsed) = v.parse() {
                config.chunk_pool_prewarm_size = parsed;
            }
        }
        if let Ok(v) = std::env::var("ACCUMULATOR_STATE_TTL_SECS") {
            if let Ok(parsed) = v.parse() {
                config.state_ttl = Duration::from_secs(parsed);
            }
        }
        if let Ok(v) = std::env::var("ACCUMULATOR_SWEEP_INTERVAL_SECS") {
            if let Ok(parsed) = v.parse() {
                config.sweep_interval = Duration::from_secs(parsed);
            }
        }

        config
    }
}

mod duration_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = AccumulatorConfig::default();
        assert_eq!(config.chunk_pool_prewarm_size, 1_000);
        assert_eq!(config.state_ttl, Duration::from_secs(1_800));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn from_env_falls_back_on_malformed_value() {
        std::env::set_var("ACCUMULATOR_SWEEP_INTERVAL_SECS", "not-a-number");
        let config = AccumulatorConfig::from_env();
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        std::env::remove_var("ACCUMULATOR_SWEEP_INTERVAL_SECS");
    }
}
