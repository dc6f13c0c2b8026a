//! Lightweight in-process metrics (dependency-free).
//!
//! Metrics are stored as atomics and rendered by the `/metrics` handler.

pub mod metrics;

pub use metrics::RelayMetrics;
