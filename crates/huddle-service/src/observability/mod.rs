//! Observability module for Huddle.
//!
//! Provides metrics definitions and the Prometheus recorder.

pub mod metrics;
