//! Context manager for sharing state between capability modules
//!
//! Holds scoped, optionally expiring key/value entries plus per-user state
//! (preferences, conversation history, current tasks) and the session to
//! user mapping. Every call runs under one manager-wide lock, so no caller
//! observes a half-updated table. Nothing under the lock performs I/O.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{ContextError, ContextResult};
use super::types::{
    ContextEntry, ContextScope, ContextStats, ConversationRecord, SessionId, UserContext, UserId,
};
use crate::background::BackgroundTask;
use crate::config::ContextConfig;

/// Shared reference to ContextManager
pub type SharedContextManager = Arc<ContextManager>;

/// Everything guarded by the manager lock
struct ContextState {
    scopes: HashMap<ContextScope, HashMap<String, ContextEntry>>,
    sessions: HashMap<SessionId, UserId>,
    users: HashMap<UserId, UserContext>,
}

impl ContextState {
    fn new() -> Self {
        Self {
            scopes: ContextScope::all()
                .iter()
                .map(|scope| (*scope, HashMap::new()))
                .collect(),
            sessions: HashMap::new(),
            users: HashMap::new(),
        }
    }

    fn table(&mut self, scope: ContextScope) -> &mut HashMap<String, ContextEntry> {
        self.scopes.entry(scope).or_default()
    }

    /// Get or create a user, evicting the least recently active idle user
    /// when the cap is reached
    fn user_mut(&mut self, user_id: &str, max_users: usize) -> &mut UserContext {
        if !self.users.contains_key(user_id) {
            if self.users.len() >= max_users {
                self.evict_idle_user(max_users);
            }
            debug!(user_id, "Created user context");
        }
        self.users
            .entry(user_id.to_string())
            .or_insert_with(|| UserContext::new(user_id))
    }

    fn evict_idle_user(&mut self, max_users: usize) {
        let with_sessions: HashSet<&UserId> = self.sessions.values().collect();
        let candidate = self
            .users
            .values()
            .filter(|u| !with_sessions.contains(&u.user_id))
            .min_by_key(|u| u.last_activity)
            .map(|u| u.user_id.clone());

        match candidate {
            Some(user_id) => {
                self.users.remove(&user_id);
                info!(%user_id, max_users, "Evicted least recently active user context");
            }
            None => warn!(
                max_users,
                "All user contexts have active sessions; exceeding user cap"
            ),
        }
    }

    /// Remove every SESSION entry namespaced under `session_id`
    fn purge_session_keys(&mut self, session_id: &str) -> usize {
        let prefix = format!("{}:", session_id);
        let table = self.table(ContextScope::Session);
        let before = table.len();
        table.retain(|key, _| !key.starts_with(&prefix));
        before - table.len()
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for table in self.scopes.values_mut() {
            let before = table.len();
            table.retain(|_, entry| !entry.is_expired_at(now));
            removed += before - table.len();
        }
        removed
    }
}

/// Key under which an entry is stored in its scope table
fn effective_key(key: &str, scope: ContextScope, session_id: Option<&str>) -> String {
    match (scope, session_id) {
        (ContextScope::Session, Some(session_id)) => format!("{}:{}", session_id, key),
        _ => key.to_string(),
    }
}

async fn run_cleanup_loop(
    state: Arc<Mutex<ContextState>>,
    interval: StdDuration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; the first sweep runs one interval in.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let removed = state.lock().await.purge_expired(Utc::now());
                if removed > 0 {
                    info!(removed, "Cleaned up expired context entries");
                }
            }
        }
    }
    debug!("Context cleanup loop exited");
}

/// Scoped key/value store with sessions and per-user state
pub struct ContextManager {
    config: ContextConfig,
    state: Arc<Mutex<ContextState>>,
    cleanup: Mutex<Option<BackgroundTask>>,
}

impl ContextManager {
    /// Create a manager with default settings
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// Create a manager with explicit settings
    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(ContextState::new())),
            cleanup: Mutex::new(None),
        }
    }

    /// Create a shared reference to this context manager
    pub fn shared(self) -> SharedContextManager {
        Arc::new(self)
    }

    /// Settings this manager was built with
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the background expiration sweep. No-op when already running.
    pub async fn start(&self) {
        let mut cleanup = self.cleanup.lock().await;
        if cleanup.as_ref().is_some_and(BackgroundTask::is_running) {
            return;
        }

        let state = Arc::clone(&self.state);
        let interval = self.config.cleanup_interval.max(StdDuration::from_millis(1));
        *cleanup = Some(BackgroundTask::spawn("context-cleanup", move |cancel| {
            run_cleanup_loop(state, interval, cancel)
        }));
        info!(interval_secs = interval.as_secs_f64(), "Context Manager started");
    }

    /// Stop the background sweep. No-op when not running.
    pub async fn stop(&self) {
        let task = self.cleanup.lock().await.take();
        if let Some(task) = task {
            task.shutdown().await;
            info!("Context Manager stopped");
        }
    }

    /// Whether the background sweep is running
    pub async fn is_running(&self) -> bool {
        self.cleanup
            .lock()
            .await
            .as_ref()
            .is_some_and(BackgroundTask::is_running)
    }

    /// Remove every expired entry from all scopes, returning the count removed
    pub async fn cleanup_expired(&self) -> usize {
        let removed = self.state.lock().await.purge_expired(Utc::now());
        if removed > 0 {
            info!(removed, "Cleaned up expired context entries");
        }
        removed
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Open a session for `user_id`, creating the user context if needed
    pub async fn create_session(&self, user_id: &str) -> SessionId {
        let session_id = uuid::Uuid::new_v4().to_string();
        let mut state = self.state.lock().await;
        state.sessions.insert(session_id.clone(), user_id.to_string());
        state.user_mut(user_id, self.config.max_user_contexts).touch();

        info!(session_id, user_id, "Created session");
        session_id
    }

    /// Close a session and delete its SESSION-scoped keys
    ///
    /// Returns the number of keys deleted.
    pub async fn try_end_session(&self, session_id: &str) -> ContextResult<usize> {
        let mut state = self.state.lock().await;
        let user_id = state
            .sessions
            .remove(session_id)
            .ok_or_else(|| ContextError::SessionNotFound(session_id.to_string()))?;
        let purged = state.purge_session_keys(session_id);

        info!(session_id, %user_id, purged, "Ended session");
        Ok(purged)
    }

    /// Close a session. Returns false when the session was unknown.
    pub async fn end_session(&self, session_id: &str) -> bool {
        match self.try_end_session(session_id).await {
            Ok(_) => true,
            Err(e) => {
                debug!(session_id, "{}", e);
                false
            }
        }
    }

    /// User that owns a session
    pub async fn get_session_user(&self, session_id: &str) -> Option<UserId> {
        self.state.lock().await.sessions.get(session_id).cloned()
    }

    /// Ids of all open sessions, sorted
    pub async fn active_sessions(&self) -> Vec<SessionId> {
        let mut sessions: Vec<SessionId> = self.state.lock().await.sessions.keys().cloned().collect();
        sessions.sort();
        sessions
    }

    // =========================================================================
    // Scoped entries
    // =========================================================================

    /// Store a value, replacing any existing entry under the same key
    ///
    /// SESSION-scoped keys given a `session_id` are namespaced under it, and
    /// the session must be open so `end_session` can purge them later.
    pub async fn try_set_context(
        &self,
        key: &str,
        value: Value,
        scope: ContextScope,
        session_id: Option<&str>,
        expires_in: Option<Duration>,
        metadata: Option<HashMap<String, Value>>,
    ) -> ContextResult<()> {
        if key.is_empty() {
            return Err(ContextError::InvalidKey);
        }

        let full_key = effective_key(key, scope, session_id);
        let entry = ContextEntry::new(full_key.clone(), value, scope, expires_in)?
            .with_metadata(metadata.unwrap_or_default());

        let mut state = self.state.lock().await;
        if let (ContextScope::Session, Some(session_id)) = (scope, session_id) {
            if !state.sessions.contains_key(session_id) {
                return Err(ContextError::SessionNotFound(session_id.to_string()));
            }
        }
        let table = state.table(scope);

        if let Some(capacity) = self.config.max_entries_per_scope {
            if !table.contains_key(&full_key) && table.len() >= capacity {
                let now = entry.created_at;
                table.retain(|_, e| !e.is_expired_at(now));
                if table.len() >= capacity {
                    return Err(ContextError::ScopeFull { scope, capacity });
                }
            }
        }

        table.insert(full_key.clone(), entry);
        debug!(key = %full_key, %scope, "Set context");
        Ok(())
    }

    /// Store a value. Returns false when the entry was rejected.
    pub async fn set_context(
        &self,
        key: &str,
        value: Value,
        scope: ContextScope,
        session_id: Option<&str>,
        expires_in: Option<Duration>,
        metadata: Option<HashMap<String, Value>>,
    ) -> bool {
        match self
            .try_set_context(key, value, scope, session_id, expires_in, metadata)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(key, %scope, "Error setting context: {}", e);
                false
            }
        }
    }

    /// Full entry for a key, or `None` when absent or expired
    ///
    /// An expired entry is deleted as a side effect of being observed.
    pub async fn get_entry(
        &self,
        key: &str,
        scope: ContextScope,
        session_id: Option<&str>,
    ) -> Option<ContextEntry> {
        let full_key = effective_key(key, scope, session_id);
        let mut state = self.state.lock().await;
        let table = state.table(scope);

        if table.get(&full_key)?.is_expired() {
            table.remove(&full_key);
            debug!(key = %full_key, %scope, "Removed expired context on read");
            return None;
        }
        table.get(&full_key).cloned()
    }

    /// Value for a key, or `None` when absent or expired
    pub async fn get_context(
        &self,
        key: &str,
        scope: ContextScope,
        session_id: Option<&str>,
    ) -> Option<Value> {
        self.get_entry(key, scope, session_id).await.map(|e| e.value)
    }

    /// Value for a key, or `default` when absent or expired
    pub async fn get_context_or(
        &self,
        key: &str,
        scope: ContextScope,
        session_id: Option<&str>,
        default: Value,
    ) -> Value {
        self.get_context(key, scope, session_id)
            .await
            .unwrap_or(default)
    }

    /// Delete an entry. Returns false when the key was absent.
    pub async fn remove_context(
        &self,
        key: &str,
        scope: ContextScope,
        session_id: Option<&str>,
    ) -> bool {
        let full_key = effective_key(key, scope, session_id);
        let removed = self.state.lock().await.table(scope).remove(&full_key).is_some();
        if removed {
            debug!(key = %full_key, %scope, "Removed context");
        }
        removed
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Snapshot of a user's context
    pub async fn get_user_context(&self, user_id: &str) -> Option<UserContext> {
        self.state.lock().await.users.get(user_id).cloned()
    }

    /// Upsert a preference, creating the user context if needed
    pub async fn update_user_preference(&self, user_id: &str, key: &str, value: Value) -> bool {
        let mut state = self.state.lock().await;
        let user = state.user_mut(user_id, self.config.max_user_contexts);
        user.preferences.insert(key.to_string(), value);
        user.touch();

        debug!(user_id, preference = key, "Updated user preference");
        true
    }

    /// A single preference value
    pub async fn get_user_preference(&self, user_id: &str, key: &str) -> Option<Value> {
        self.state
            .lock()
            .await
            .users
            .get(user_id)
            .and_then(|u| u.preferences.get(key).cloned())
    }

    /// Append a timestamped message to the user's history, creating the user
    /// context if needed. The oldest messages drop beyond the history limit.
    pub async fn add_to_conversation_history(&self, user_id: &str, message: Value) -> bool {
        let max_history = self.config.max_history;
        let mut state = self.state.lock().await;
        state
            .user_mut(user_id, self.config.max_user_contexts)
            .push_message(message, max_history);
        true
    }

    /// Most recent conversation records, oldest first; `limit` of zero returns all
    pub async fn get_conversation_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Vec<ConversationRecord> {
        let state = self.state.lock().await;
        let Some(user) = state.users.get(user_id) else {
            return Vec::new();
        };

        let history = &user.conversation_history;
        let skip = if limit == 0 {
            0
        } else {
            history.len().saturating_sub(limit)
        };
        history.iter().skip(skip).cloned().collect()
    }

    /// Mark a task as current for the user. Returns false when already tracked.
    pub async fn add_user_task(&self, user_id: &str, task_id: &str) -> bool {
        let mut state = self.state.lock().await;
        let user = state.user_mut(user_id, self.config.max_user_contexts);
        user.touch();
        user.current_tasks.insert(task_id.to_string())
    }

    /// Remove a task from the user's current tasks
    ///
    /// Returns whether the task was tracked.
    pub async fn complete_user_task(&self, user_id: &str, task_id: &str) -> ContextResult<bool> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| ContextError::UserNotFound(user_id.to_string()))?;
        user.touch();
        Ok(user.current_tasks.remove(task_id))
    }

    /// Forget a user, ending any sessions they still hold
    pub async fn remove_user_context(&self, user_id: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.users.remove(user_id).is_none() {
            return false;
        }

        let owned: Vec<SessionId> = state
            .sessions
            .iter()
            .filter(|(_, owner)| owner.as_str() == user_id)
            .map(|(session_id, _)| session_id.clone())
            .collect();
        for session_id in &owned {
            state.sessions.remove(session_id);
            state.purge_session_keys(session_id);
        }

        info!(user_id, sessions_ended = owned.len(), "Removed user context");
        true
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Session, user and per-scope entry counts
    pub async fn get_stats(&self) -> ContextStats {
        let state = self.state.lock().await;
        let context_counts: std::collections::BTreeMap<String, usize> = ContextScope::all()
            .iter()
            .map(|scope| {
                let count = state.scopes.get(scope).map_or(0, HashMap::len);
                (scope.as_str().to_string(), count)
            })
            .collect();

        ContextStats {
            active_sessions: state.sessions.len(),
            user_contexts: state.users.len(),
            total_entries: context_counts.values().sum(),
            context_counts,
        }
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_effective_key() {
        assert_eq!(effective_key("lang", ContextScope::Session, Some("s1")), "s1:lang");
        assert_eq!(effective_key("lang", ContextScope::Session, None), "lang");
        assert_eq!(effective_key("lang", ContextScope::Global, Some("s1")), "lang");
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let manager = ContextManager::new();
        assert!(
            manager
                .set_context("lang", json!("de"), ContextScope::Global, None, None, None)
                .await
        );
        assert_eq!(
            manager.get_context("lang", ContextScope::Global, None).await,
            Some(json!("de"))
        );
        assert!(manager.get_context("lang", ContextScope::User, None).await.is_none());

        assert!(manager.remove_context("lang", ContextScope::Global, None).await);
        assert!(!manager.remove_context("lang", ContextScope::Global, None).await);
        assert_eq!(
            manager
                .get_context_or("lang", ContextScope::Global, None, json!("en"))
                .await,
            json!("en")
        );
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let manager = ContextManager::new();
        let err = manager
            .try_set_context("", json!(1), ContextScope::Task, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::InvalidKey));
        assert!(!manager.set_context("", json!(1), ContextScope::Task, None, None, None).await);
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_fails_without_panicking() {
        let manager = ContextManager::new();
        let err = manager
            .try_set_context("k", json!(1), ContextScope::Task, None, Some(Duration::MAX), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::InvalidTtl { .. }));

        assert!(
            !manager
                .set_context("k", json!(1), ContextScope::Task, None, Some(Duration::MAX), None)
                .await
        );
        assert_eq!(manager.get_stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_session_write_requires_open_session() {
        let manager = ContextManager::new();
        let err = manager
            .try_set_context("k", json!(1), ContextScope::Session, Some("unknown"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::SessionNotFound(_)));

        let session_id = manager.create_session("frank").await;
        assert!(
            manager
                .set_context("k", json!(1), ContextScope::Session, Some(&session_id), None, None)
                .await
        );
        manager.end_session(&session_id).await;
        assert!(
            !manager
                .set_context("k", json!(2), ContextScope::Session, Some(&session_id), None, None)
                .await
        );
        assert_eq!(manager.get_stats().await.count(ContextScope::Session), 0);
    }

    #[tokio::test]
    async fn test_dropping_manager_stops_sweep() {
        let manager = ContextManager::new();
        let state = Arc::downgrade(&manager.state);
        manager.start().await;
        assert!(manager.is_running().await);

        drop(manager);
        tokio::time::timeout(StdDuration::from_secs(5), async {
            while state.upgrade().is_some() {
                tokio::time::sleep(StdDuration::from_millis(10)).await;
            }
        })
        .await
        .expect("cleanup loop kept the context state alive");
    }

    #[tokio::test]
    async fn test_metadata_is_kept() {
        let manager = ContextManager::new();
        let metadata = HashMap::from([("origin".to_string(), json!("vision"))]);
        manager
            .set_context("objects", json!(["cup"]), ContextScope::Task, None, None, Some(metadata))
            .await;

        let entry = manager.get_entry("objects", ContextScope::Task, None).await.unwrap();
        assert_eq!(entry.metadata["origin"], json!("vision"));
        assert_eq!(entry.scope, ContextScope::Task);
        assert!(entry.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_removed_on_read() {
        let manager = ContextManager::new();
        manager
            .set_context("k", json!(1), ContextScope::Task, None, Some(Duration::zero()), None)
            .await;

        assert!(manager.get_context("k", ContextScope::Task, None).await.is_none());
        assert_eq!(manager.get_stats().await.count(ContextScope::Task), 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired_counts() {
        let manager = ContextManager::new();
        for key in ["a", "b"] {
            manager
                .set_context(key, json!(1), ContextScope::Global, None, Some(Duration::zero()), None)
                .await;
        }
        manager
            .set_context("c", json!(1), ContextScope::Global, None, Some(Duration::hours(1)), None)
            .await;

        assert_eq!(manager.cleanup_expired().await, 2);
        assert_eq!(manager.get_stats().await.count(ContextScope::Global), 1);
    }

    #[tokio::test]
    async fn test_scope_capacity() {
        let manager = ContextManager::with_config(ContextConfig {
            max_entries_per_scope: Some(2),
            ..ContextConfig::default()
        });

        assert!(manager.set_context("a", json!(1), ContextScope::Task, None, None, None).await);
        assert!(
            manager
                .set_context("b", json!(1), ContextScope::Task, None, Some(Duration::zero()), None)
                .await
        );
        // "b" is expired, so it is purged to make room for "c"
        assert!(manager.set_context("c", json!(1), ContextScope::Task, None, None, None).await);

        let err = manager
            .try_set_context("d", json!(1), ContextScope::Task, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::ScopeFull { capacity: 2, .. }));

        // Overwriting an existing key and writing to another scope still work
        assert!(manager.set_context("a", json!(2), ContextScope::Task, None, None, None).await);
        assert!(manager.set_context("d", json!(1), ContextScope::Global, None, None, None).await);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let manager = ContextManager::new();
        let session_id = manager.create_session("alice").await;

        assert_eq!(manager.get_session_user(&session_id).await.as_deref(), Some("alice"));
        assert!(manager.get_user_context("alice").await.is_some());
        assert_eq!(manager.active_sessions().await, vec![session_id.clone()]);

        manager
            .set_context("topic", json!("weather"), ContextScope::Session, Some(&session_id), None, None)
            .await;
        assert_eq!(manager.try_end_session(&session_id).await.unwrap(), 1);

        assert!(manager.get_session_user(&session_id).await.is_none());
        assert!(!manager.end_session(&session_id).await);
        assert!(matches!(
            manager.try_end_session(&session_id).await,
            Err(ContextError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_user_tasks() {
        let manager = ContextManager::new();
        assert!(manager.add_user_task("bob", "task-1").await);
        assert!(!manager.add_user_task("bob", "task-1").await);
        assert!(manager.add_user_task("bob", "task-2").await);

        assert!(manager.complete_user_task("bob", "task-1").await.unwrap());
        assert!(!manager.complete_user_task("bob", "task-1").await.unwrap());
        assert!(matches!(
            manager.complete_user_task("nobody", "task-1").await,
            Err(ContextError::UserNotFound(_))
        ));

        let user = manager.get_user_context("bob").await.unwrap();
        assert_eq!(user.current_tasks.len(), 1);
        assert!(user.current_tasks.contains("task-2"));
    }

    #[tokio::test]
    async fn test_preferences() {
        let manager = ContextManager::new();
        assert!(manager.update_user_preference("carol", "voice", json!("female")).await);
        assert!(manager.update_user_preference("carol", "voice", json!("male")).await);

        assert_eq!(
            manager.get_user_preference("carol", "voice").await,
            Some(json!("male"))
        );
        assert!(manager.get_user_preference("carol", "speed").await.is_none());
        assert!(manager.get_user_preference("dave", "voice").await.is_none());
    }

    #[tokio::test]
    async fn test_user_cap_evicts_idle_user() {
        let manager = ContextManager::with_config(ContextConfig {
            max_user_contexts: 2,
            ..ContextConfig::default()
        });

        // "active" holds a session and must survive eviction even though it is oldest
        let _session = manager.create_session("active").await;
        manager.update_user_preference("idle", "k", json!(1)).await;
        manager.update_user_preference("newcomer", "k", json!(1)).await;

        assert!(manager.get_user_context("active").await.is_some());
        assert!(manager.get_user_context("idle").await.is_none());
        assert!(manager.get_user_context("newcomer").await.is_some());
        assert_eq!(manager.get_stats().await.user_contexts, 2);
    }

    #[tokio::test]
    async fn test_user_cap_exceeded_when_all_have_sessions() {
        let manager = ContextManager::with_config(ContextConfig {
            max_user_contexts: 1,
            ..ContextConfig::default()
        });

        manager.create_session("a").await;
        manager.create_session("b").await;
        assert_eq!(manager.get_stats().await.user_contexts, 2);
    }

    #[tokio::test]
    async fn test_remove_user_context_ends_sessions() {
        let manager = ContextManager::new();
        let session_id = manager.create_session("erin").await;
        manager
            .set_context("k", json!(1), ContextScope::Session, Some(&session_id), None, None)
            .await;

        assert!(manager.remove_user_context("erin").await);
        assert!(!manager.remove_user_context("erin").await);

        let stats = manager.get_stats().await;
        assert_eq!(stats.active_sessions, 0);
        assert_eq!(stats.count(ContextScope::Session), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_runs_on_interval() {
        let manager = ContextManager::new();
        manager
            .set_context("k", json!(1), ContextScope::Global, None, Some(Duration::zero()), None)
            .await;
        manager.start().await;

        tokio::time::sleep(StdDuration::from_secs(DEFAULT_SWEEP_WAIT_SECS)).await;
        assert_eq!(manager.get_stats().await.count(ContextScope::Global), 0);
        manager.stop().await;
    }

    const DEFAULT_SWEEP_WAIT_SECS: u64 = crate::config::DEFAULT_CLEANUP_INTERVAL_SECS + 1;

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let manager = ContextManager::new();
        manager.stop().await;
        manager.start().await;
        manager.start().await;
        assert!(manager.is_running().await);
        manager.stop().await;
        manager.stop().await;
        assert!(!manager.is_running().await);
    }
}
