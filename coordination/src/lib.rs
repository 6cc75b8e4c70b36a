//! Jarvis Coordination Library
//!
//! The coordination backbone shared by the assistant's capability modules
//! (speech, vision, automation, ...):
//! - [`events`]: prioritized asynchronous publish/subscribe event bus
//! - [`context`]: scoped, expiring key/value context with sessions and
//!   per-user state
//! - [`assistant`]: [`AssistantCore`], which owns one of each for the process
//!
//! Modules never reference each other directly. They publish and subscribe
//! to event types on the bus and read or write shared context.
//!
//! # Usage
//!
//! ```bash
//! # Run the demonstration binary
//! jarvis-coordination
//!
//! # With a config file and a faster sweep
//! jarvis-coordination --config ./jarvis.toml --cleanup-interval-secs 30
//!
//! # Environment overrides
//! JARVIS_EVENT_HISTORY_CAPACITY=5000 RUST_LOG=jarvis_coordination=debug jarvis-coordination
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod assistant;
pub mod background;
pub mod config;
pub mod context;
pub mod events;

pub use assistant::AssistantCore;
pub use config::{ContextConfig, CoordinationConfig, EventBusConfig};
pub use context::{
    ContextEntry, ContextError, ContextManager, ContextResult, ContextScope, ContextStats,
    SharedContextManager, UserContext,
};
pub use events::{
    event_types, Event, EventBus, EventBusError, EventBusStats, EventHandler, EventPriority,
    FnHandler, SharedEventBus, SharedHandler,
};
