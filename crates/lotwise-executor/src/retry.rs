//! Retry policy for transient placement failures.
//!
//! Disabled by default. When enabled, only `PlacementError::Transient` is
//! retried: rejections and timeouts may correspond to an order the broker
//! holds, and re-sending could double the position.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExecutorError, ExecutorResult};
use crate::placer::PlacementError;

/// Capped exponential backoff settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    2_000
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffConfig {
    /// Delay before retry number `retry` (1-based).
    ///
    /// retry=1 -> base, retry=2 -> 2*base, retry=3 -> 4*base, capped at max.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(10);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// What to do after a failed placement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Record the failure and move on.
    #[default]
    None,
    /// Retry transient failures with capped exponential backoff.
    Backoff(BackoffConfig),
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` to give up.
    ///
    /// `attempts_made` counts placement calls already made for this leg.
    pub fn next_delay(&self, error: &PlacementError, attempts_made: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Backoff(config) => {
                if !error.is_retryable() || attempts_made > config.max_retries {
                    return None;
                }
                Some(config.delay_for(attempts_made))
            }
        }
    }

    pub fn validate(&self) -> ExecutorResult<()> {
        if let Self::Backoff(config) = self {
            if config.base_delay_ms > config.max_delay_ms {
                return Err(ExecutorError::ConfigError(format!(
                    "retry base_delay_ms ({}) exceeds max_delay_ms ({})",
                    config.base_delay_ms, config.max_delay_ms
                )));
            }
        }
        Ok(())
    }
}
