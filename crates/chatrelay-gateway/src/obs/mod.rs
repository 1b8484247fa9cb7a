//! Lightweight in-process metrics.
//!
//! Metrics are stored as atomics keyed by label sets in `DashMap` and
//! rendered in Prometheus text format by the `/metrics` handler.

pub mod metrics;

pub use metrics::RelayMetrics;
