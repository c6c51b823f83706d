//! # Engine Context
//!
//! The single object a process builds at startup and hands, by reference, to
//! every peer and dispatcher: the frozen message registry, the shared metrics
//! and the configuration. Cloning is cheap; every part is behind an `Arc`.
//!
//! ```rust
//! use net_dispatch::context::NetContext;
//! use net_dispatch::protocol::registry::MessageRegistry;
//!
//! let ctx = NetContext::new(MessageRegistry::register_all());
//! assert!(ctx.registry().contains(10));
//! assert_eq!(ctx.metrics().snapshot().messages_dispatched, 0);
//! ```

use crate::config::NetworkConfig;
use crate::protocol::registry::MessageRegistry;
use crate::utils::metrics::Metrics;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct NetContext {
    registry: Arc<MessageRegistry>,
    metrics: Arc<Metrics>,
    config: Arc<NetworkConfig>,
}

impl NetContext {
    /// Context with default configuration
    pub fn new(registry: MessageRegistry) -> Self {
        Self::with_config(registry, NetworkConfig::default())
    }

    pub fn with_config(registry: MessageRegistry, config: NetworkConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(Metrics::new()),
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}
