//! # Utility Modules
//!
//! Supporting utilities used throughout the engine.
//!
//! ## Components
//! - **Pool**: per-tag reuse of message instances with RAII release
//! - **Metrics**: Thread-safe observability counters
//! - **Logging**: Structured logging configuration

pub mod logging;
pub mod metrics;
pub mod pool;

pub use metrics::{Metrics, MetricsSnapshot};
pub use pool::{NetDataPool, Pooled};
