//! Error types for the fan-out core.

use thiserror::Error;

/// Errors raised by analyzer pool mutations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("analyzer {0:?} is already registered")]
    DuplicateAnalyzer(String),
}

/// A failed delivery attempt to a downstream analyzer.
///
/// Transport failures take the target out of rotation until the next
/// successful health probe; status failures leave liveness to the prober.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("request to analyzer {id} failed: {source}")]
    Transport {
        id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("analyzer {id} returned status {status}")]
    Status {
        id: String,
        status: reqwest::StatusCode,
    },
}

/// Invalid engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
