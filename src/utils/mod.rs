//! # Utility Modules
//!
//! Ambient support shared by both bridge sides.
//!
//! ## Components
//! - **Logging**: tracing-subscriber setup from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: per-bridge atomic counters and snapshots

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
