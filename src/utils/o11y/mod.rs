//! Common observability utilities.
//!
//! This module provides the tools for tracing and logging throughout the
//! producer and consumer.
//!
pub mod logging;
