//! Configuration for the event bus and context manager
//!
//! Values resolve in layers: built-in defaults, then an optional TOML file,
//! then `JARVIS_*` environment variables. The binary applies its command
//! line flags last.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::events::history::DEFAULT_HISTORY_CAPACITY;

/// Default seconds between context expiration sweeps
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Default conversation history length per user
pub const DEFAULT_MAX_CONVERSATION_HISTORY: usize = 1000;

/// Default cap on tracked user contexts
pub const DEFAULT_MAX_USER_CONTEXTS: usize = 10_000;

/// Event bus settings
#[derive(Debug, Clone, PartialEq)]
pub struct EventBusConfig {
    /// Number of published events kept for introspection
    pub history_capacity: usize,
    /// Maximum queued events; `None` means unbounded
    pub queue_capacity: Option<usize>,
    /// How long the dispatch loop waits for work before re-checking cancellation
    pub poll_interval: Duration,
    /// Whether `publish` starts the dispatch loop when it is not running
    pub auto_start: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            queue_capacity: None,
            poll_interval: Duration::from_secs(1),
            auto_start: true,
        }
    }
}

/// Context manager settings
#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    /// Interval between expiration sweeps
    pub cleanup_interval: Duration,
    /// Conversation records kept per user
    pub max_history: usize,
    /// Tracked users before least-recently-active eviction kicks in
    pub max_user_contexts: usize,
    /// Entries allowed per scope table; `None` means unbounded
    pub max_entries_per_scope: Option<usize>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            max_history: DEFAULT_MAX_CONVERSATION_HISTORY,
            max_user_contexts: DEFAULT_MAX_USER_CONTEXTS,
            max_entries_per_scope: None,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinationConfig {
    pub bus: EventBusConfig,
    pub context: ContextConfig,
}

/// On-disk configuration; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub event_bus: EventBusSection,
    pub context: ContextSection,
}

/// `[event_bus]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventBusSection {
    pub history_capacity: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub auto_start: Option<bool>,
}

/// `[context]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextSection {
    pub cleanup_interval_secs: Option<u64>,
    pub max_history: Option<usize>,
    pub max_user_contexts: Option<usize>,
    pub max_entries_per_scope: Option<usize>,
}

impl CoordinationConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Defaults overridden by a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Defaults overridden by a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = Self::default();
        config.apply_file(&file);
        Ok(config)
    }

    /// Apply every `Some` field of a parsed config file
    pub fn apply_file(&mut self, file: &ConfigFile) {
        let bus = &file.event_bus;
        if let Some(v) = bus.history_capacity {
            self.bus.history_capacity = v;
        }
        if let Some(v) = bus.queue_capacity {
            self.bus.queue_capacity = Some(v);
        }
        if let Some(v) = bus.poll_interval_ms {
            self.bus.poll_interval = Duration::from_millis(v);
        }
        if let Some(v) = bus.auto_start {
            self.bus.auto_start = v;
        }

        let ctx = &file.context;
        if let Some(v) = ctx.cleanup_interval_secs {
            self.context.cleanup_interval = Duration::from_secs(v);
        }
        if let Some(v) = ctx.max_history {
            self.context.max_history = v;
        }
        if let Some(v) = ctx.max_user_contexts {
            self.context.max_user_contexts = v;
        }
        if let Some(v) = ctx.max_entries_per_scope {
            self.context.max_entries_per_scope = Some(v);
        }
    }

    /// Apply `JARVIS_*` environment overrides
    ///
    /// Unparseable values are ignored and the previous value kept.
    pub fn apply_env(&mut self) {
        if let Some(v) = parse_env("JARVIS_EVENT_HISTORY_CAPACITY") {
            self.bus.history_capacity = v;
        }
        if let Some(v) = parse_env("JARVIS_EVENT_QUEUE_CAPACITY") {
            self.bus.queue_capacity = Some(v);
        }
        if let Some(v) = parse_env("JARVIS_EVENT_POLL_INTERVAL_MS") {
            self.bus.poll_interval = Duration::from_millis(v);
        }
        if let Ok(val) = std::env::var("JARVIS_EVENT_AUTO_START") {
            self.bus.auto_start = parse_bool(&val);
        }
        if let Some(v) = parse_env("JARVIS_CONTEXT_CLEANUP_INTERVAL_SECS") {
            self.context.cleanup_interval = Duration::from_secs(v);
        }
        if let Some(v) = parse_env("JARVIS_CONTEXT_MAX_HISTORY") {
            self.context.max_history = v;
        }
        if let Some(v) = parse_env("JARVIS_CONTEXT_MAX_USERS") {
            self.context.max_user_contexts = v;
        }
        if let Some(v) = parse_env("JARVIS_CONTEXT_MAX_ENTRIES_PER_SCOPE") {
            self.context.max_entries_per_scope = Some(v);
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.trim().parse().ok())
}

/// Accepts "1", "true" or "yes" (case-insensitive)
fn parse_bool(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}
