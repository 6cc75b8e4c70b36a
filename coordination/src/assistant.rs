//! Process-wide owner of the event bus and context manager
//!
//! Construct one [`AssistantCore`] at process start and hand the shared
//! handles from [`AssistantCore::bus`] and [`AssistantCore::context`] to each
//! capability module.

use tracing::info;

use crate::config::CoordinationConfig;
use crate::context::{ContextManager, SharedContextManager};
use crate::events::{EventBus, SharedEventBus};

/// Owns one event bus and one context manager
pub struct AssistantCore {
    bus: SharedEventBus,
    context: SharedContextManager,
}

impl AssistantCore {
    pub fn new(config: CoordinationConfig) -> Self {
        Self {
            bus: EventBus::with_config(config.bus).shared(),
            context: ContextManager::with_config(config.context).shared(),
        }
    }

    /// Start the dispatch loop and the context sweep
    pub async fn start(&self) {
        self.bus.start().await;
        self.context.start().await;
        info!("Assistant core started");
    }

    /// Stop both background loops. Safe to call repeatedly.
    pub async fn stop(&self) {
        self.context.stop().await;
        self.bus.stop().await;
        info!("Assistant core stopped");
    }

    /// Shared event bus handle
    pub fn bus(&self) -> SharedEventBus {
        SharedEventBus::clone(&self.bus)
    }

    /// Shared context manager handle
    pub fn context(&self) -> SharedContextManager {
        SharedContextManager::clone(&self.context)
    }
}

impl Default for AssistantCore {
    fn default() -> Self {
        Self::new(CoordinationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_handles_are_shared() {
        let core = AssistantCore::default();
        assert!(Arc::ptr_eq(&core.bus(), &core.bus()));
        assert!(Arc::ptr_eq(&core.context(), &core.context()));
    }

    #[tokio::test]
    async fn test_start_stop() {
        let core = AssistantCore::default();
        core.start().await;
        assert!(core.bus().is_running().await);
        assert!(core.context().is_running().await);

        core.stop().await;
        core.stop().await;
        assert!(!core.bus().is_running().await);
        assert!(!core.context().is_running().await);
    }
}
