//! Event-driven coordination between capability modules
//!
//! # Architecture
//!
//! 1. **Event Types** (`types.rs`): the [`Event`] record, its priority and
//!    the well-known event type names.
//!
//! 2. **Handlers** (`handler.rs`): the async [`EventHandler`] trait plus
//!    adapters for async and blocking closures.
//!
//! 3. **Event Bus** (`bus.rs`): priority queue, dispatch loop and
//!    subscriber table.
//!
//! 4. **Event History** (`history.rs`): bounded ring buffer of published
//!    events for debugging.
//!
//! # Event Flow
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Producer   │────▶│  Priority    │────▶│  Dispatch    │──┬─▶ handler A
//! │  (publish)   │     │  queue       │     │  loop        │  └─▶ handler B
//! └──────────────┘     └──────┬───────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │   History    │
//!                      │ (ring buffer)│
//!                      └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use jarvis_coordination::events::{event_types, Event, EventBus, EventPriority, FnHandler};
//!
//! let bus = EventBus::new().shared();
//!
//! bus.subscribe(
//!     event_types::INTENT_DETECTED,
//!     FnHandler::new("intent_router", |event: Event| async move {
//!         tracing::info!(intent = ?event.get("intent"), "routing intent");
//!         Ok(())
//!     })
//!     .shared(),
//! )
//! .await;
//!
//! bus.publish(
//!     Event::empty(event_types::INTENT_DETECTED)
//!         .with_field("intent", "weather")
//!         .with_priority(EventPriority::High)
//!         .with_source("speech_processor"),
//! )
//! .await;
//! ```

pub mod bus;
pub mod handler;
pub mod history;
pub mod types;

pub use bus::{EventBus, EventBusError, EventBusResult, EventBusStats, SharedEventBus};
pub use handler::{BlockingHandler, EventHandler, FnHandler, SharedHandler};
pub use history::{EventHistory, EventStats};
pub use types::{event_types, Event, EventData, EventPriority};
