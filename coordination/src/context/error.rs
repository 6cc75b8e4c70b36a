//! Context manager error types

use super::types::ContextScope;

/// Error type for context operations
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Context key must not be empty")]
    InvalidKey,

    #[error("Expiry {ttl} is out of range")]
    InvalidTtl { ttl: chrono::Duration },

    #[error("Scope {scope} is full (capacity {capacity})")]
    ScopeFull { scope: ContextScope, capacity: usize },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("User context not found: {0}")]
    UserNotFound(String),
}

/// Result type for context operations
pub type ContextResult<T> = Result<T, ContextError>;
