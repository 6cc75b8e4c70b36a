//! Shared context for capability modules
//!
//! A [`ContextManager`] stores key/value entries in four scopes
//! ([`ContextScope`]), tracks sessions and keeps per-user state
//! ([`UserContext`]). Entries may carry a time-to-live; expired entries are
//! never returned and are removed lazily on read or by the periodic sweep.
//!
//! ```text
//! create_session(user) ──▶ session_id ──▶ SESSION keys "{session_id}:{key}"
//!                                          │
//!                       end_session ───────┘ (keys purged)
//! ```

pub mod error;
pub mod manager;
pub mod types;

pub use error::{ContextError, ContextResult};
pub use manager::{ContextManager, SharedContextManager};
pub use types::{
    ContextEntry, ContextScope, ContextStats, ConversationRecord, SessionId, UserContext, UserId,
};
