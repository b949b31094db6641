//! # Fanout Core
//!
//! In-process dispatch engine for the weighted log fan-out service. Producing
//! agents POST batches of log records to a central ingress; this crate routes
//! each batch to exactly one downstream analyzer, chosen at random in
//! proportion to the weights of the currently-live analyzers.
//!
//! The library is organized into a handful of modules:
//! - [`model`]: wire types for log records and batches
//! - [`pool`]: the analyzer registry, liveness tracking, and outbound delivery
//! - [`selector`]: weighted-random choice over a live snapshot
//! - [`dispatch`]: bounded ingress queue, worker pool, retry pacing, lifecycle
//! - [`metrics`]: delivery counters and consistent snapshots
//! - [`config`]: engine tuning knobs
//!
//! The HTTP facade that feeds the engine lives in the `fanout-server` binary;
//! this crate performs no inbound I/O of its own.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pool;
pub mod selector;

pub use config::Config;
pub use dispatch::DispatchEngine;
pub use metrics::MetricsSnapshot;
pub use model::{LogBatch, LogRecord, Severity};
pub use pool::{Analyzer, AnalyzerPool, AnalyzerSink};
