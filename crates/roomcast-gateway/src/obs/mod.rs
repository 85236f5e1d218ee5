//! Lightweight in-process metrics.
//!
//! Stored as atomics in `DashMap`s and rendered in Prometheus text format by
//! the `/metrics` handler.

pub mod metrics;

pub use metrics::HubMetrics;
