//! Tuning knobs for the dispatch engine and analyzer pool.

use std::time::Duration;

use crate::error::ConfigError;

/// Engine and pool configuration.
///
/// The defaults match the documented CLI defaults of `fanout-server`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of the ingress queue and of the retry queue.
    pub queue_size: usize,
    /// Number of dispatch worker tasks.
    pub workers: usize,
    /// Period between analyzer health probe rounds.
    pub health_check_interval: Duration,
    /// Delivery attempts per batch before it is dropped.
    pub max_retries: u32,
    /// Pacing interval of the retry stream.
    pub retry_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_size: 10_000,
            workers: 10,
            health_check_interval: Duration::from_secs(10),
            max_retries: 3,
            retry_interval: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_size == 0 {
            return Err(ConfigError::Invalid(
                "queue size must be greater than 0".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid(
                "worker count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
