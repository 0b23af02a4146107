use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::assessment::ScoreWeights;
use crate::orchestrator::constants::{
    DEFAULT_BASE_BACKOFF, DEFAULT_GRADER_TIMEOUT, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_RETRIES,
    DEFAULT_SPEECH_TIMEOUT,
};

/// Timeout and retry policy for one external source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub timeout: Duration,
    /// Retries after the first attempt; `max_retries + 1` calls at most.
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl AdapterConfig {
    pub fn speech() -> Self {
        Self {
            timeout: DEFAULT_SPEECH_TIMEOUT,
            ..Self::default()
        }
    }

    pub fn grader() -> Self {
        Self {
            timeout: DEFAULT_GRADER_TIMEOUT,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based), doubling and capped.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1_u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SPEECH_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: DEFAULT_BASE_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub weights: ScoreWeights,
    pub speech: AdapterConfig,
    pub content: AdapterConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            speech: AdapterConfig::speech(),
            content: AdapterConfig::grader(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = AdapterConfig {
            timeout: Duration::from_secs(1),
            max_retries: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(config.backoff_for(1), Duration::from_millis(100));
        assert_eq!(config.backoff_for(2), Duration::from_millis(200));
        assert_eq!(config.backoff_for(3), Duration::from_millis(350));
        assert_eq!(config.backoff_for(40), Duration::from_millis(350));
        assert_eq!(config.max_attempts(), 6);
    }
}
