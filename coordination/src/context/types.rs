//! Context data model
//!
//! These types are owned by the [`ContextManager`](super::ContextManager)
//! and handed out to callers as clones.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ContextError, ContextResult};

/// Unique identifier for sessions
pub type SessionId = String;

/// Unique identifier for users
pub type UserId = String;

/// Partition of the context key space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextScope {
    /// Current session; keys are namespaced by session id
    Session,
    /// User-specific
    User,
    /// System-wide
    Global,
    /// Task-specific
    Task,
}

impl ContextScope {
    /// All scopes
    pub fn all() -> &'static [ContextScope] {
        &[
            ContextScope::Session,
            ContextScope::User,
            ContextScope::Global,
            ContextScope::Task,
        ]
    }

    /// Lowercase scope name
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextScope::Session => "session",
            ContextScope::User => "user",
            ContextScope::Global => "global",
            ContextScope::Task => "task",
        }
    }
}

impl std::fmt::Display for ContextScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single stored context value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Effective key (session keys include the `{session_id}:` prefix)
    pub key: String,
    pub value: Value,
    pub scope: ContextScope,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl ContextEntry {
    /// Create an entry stamped with the current time
    ///
    /// Fails with [`ContextError::InvalidTtl`] when the expiry instant is not
    /// representable.
    pub fn new(
        key: impl Into<String>,
        value: Value,
        scope: ContextScope,
        expires_in: Option<Duration>,
    ) -> ContextResult<Self> {
        let created_at = Utc::now();
        let expires_at = match expires_in {
            Some(ttl) => Some(
                created_at
                    .checked_add_signed(ttl)
                    .ok_or(ContextError::InvalidTtl { ttl })?,
            ),
            None => None,
        };
        Ok(Self {
            key: key.into(),
            value,
            scope,
            created_at,
            expires_at,
            metadata: HashMap::new(),
        })
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether the entry has expired at `now`
    ///
    /// An entry is expired from its expiry instant onward, so a zero TTL is
    /// already expired on the next read.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Whether the entry has expired now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// One message in a user's conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// When the message was added
    pub timestamp: DateTime<Utc>,
    /// Module-defined message fields (role, text, intent, ...)
    pub message: Value,
}

/// Per-user state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: UserId,
    pub preferences: HashMap<String, Value>,
    /// Oldest first, bounded by the manager's history limit
    pub conversation_history: VecDeque<ConversationRecord>,
    pub current_tasks: BTreeSet<String>,
    pub last_activity: DateTime<Utc>,
}

impl UserContext {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            preferences: HashMap::new(),
            conversation_history: VecDeque::new(),
            current_tasks: BTreeSet::new(),
            last_activity: Utc::now(),
        }
    }

    /// Touch the user to update last activity
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Append a message, dropping the oldest beyond `max_history`
    pub fn push_message(&mut self, message: Value, max_history: usize) {
        self.conversation_history.push_back(ConversationRecord {
            timestamp: Utc::now(),
            message,
        });
        while self.conversation_history.len() > max_history {
            self.conversation_history.pop_front();
        }
        self.touch();
    }
}

/// Context manager statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextStats {
    pub active_sessions: usize,
    pub user_contexts: usize,
    /// Entry count per scope name
    pub context_counts: BTreeMap<String, usize>,
    pub total_entries: usize,
}

impl ContextStats {
    /// Entry count for one scope
    pub fn count(&self, scope: ContextScope) -> usize {
        self.context_counts.get(scope.as_str()).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = ContextEntry::new("k", json!(1), ContextScope::Global, None).unwrap();
        assert!(!entry.is_expired());
        assert!(!entry.is_expired_at(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let entry = ContextEntry::new("k", json!(1), ContextScope::Task, Some(Duration::seconds(10)))
            .unwrap();
        let expires_at = entry.expires_at.unwrap();

        assert!(!entry.is_expired_at(expires_at - Duration::milliseconds(1)));
        assert!(entry.is_expired_at(expires_at));
    }

    #[test]
    fn test_zero_ttl_is_expired_immediately() {
        let entry = ContextEntry::new("k", json!(1), ContextScope::Task, Some(Duration::zero())).unwrap();
        assert!(entry.is_expired());
    }

    #[test]
    fn test_out_of_range_ttl_is_rejected() {
        for ttl in [Duration::MAX, Duration::MIN] {
            let err = ContextEntry::new("k", json!(1), ContextScope::Task, Some(ttl)).unwrap_err();
            assert!(matches!(err, ContextError::InvalidTtl { .. }));
        }
    }

    #[test]
    fn test_push_message_bounds_history() {
        let mut user = UserContext::new("alice");
        for i in 0..5 {
            user.push_message(json!({ "n": i }), 3);
        }

        assert_eq!(user.conversation_history.len(), 3);
        assert_eq!(user.conversation_history[0].message["n"], 2);
        assert_eq!(user.conversation_history[2].message["n"], 4);
    }

    #[test]
    fn test_scope_names() {
        let names: Vec<&str> = ContextScope::all().iter().map(ContextScope::as_str).collect();
        assert_eq!(names, vec!["session", "user", "global", "task"]);
        assert_eq!(ContextScope::Global.to_string(), "global");
    }
}
