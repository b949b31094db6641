//! HTTP facade for the weighted log fan-out service.
//!
//! The binary in `main.rs` wires CLI flags, logging, the analyzer pool, and
//! the dispatch engine together; [`api`] holds the axum router and handlers.

pub mod api;
