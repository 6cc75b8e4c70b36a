//! Event types for module coordination
//!
//! An [`Event`] is an immutable record of something that happened inside a
//! capability module. The payload is intentionally untyped at this layer:
//! each event type's shape is a contract between its producer and consumers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event payload keyed by field name
pub type EventData = HashMap<String, Value>;

/// Dispatch priority of an event
///
/// Lower numeric values are dispatched first. Priority only orders events
/// that sit in the queue at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    Critical = 1,
    High = 2,
    Normal = 3,
    Low = 4,
}

impl EventPriority {
    /// Numeric priority value (1 = most urgent)
    pub fn value(self) -> u8 {
        self as u8
    }

    /// All priorities from most to least urgent
    pub fn all() -> &'static [EventPriority] {
        &[
            EventPriority::Critical,
            EventPriority::High,
            EventPriority::Normal,
            EventPriority::Low,
        ]
    }
}

impl Default for EventPriority {
    fn default() -> Self {
        EventPriority::Normal
    }
}

impl std::fmt::Display for EventPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventPriority::Critical => write!(f, "critical"),
            EventPriority::High => write!(f, "high"),
            EventPriority::Normal => write!(f, "normal"),
            EventPriority::Low => write!(f, "low"),
        }
    }
}

/// A published event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type used for routing, e.g. `speech.input`
    #[serde(rename = "type")]
    pub event_type: String,

    /// Module-defined payload
    #[serde(default)]
    pub data: EventData,

    /// Creation time
    pub timestamp: DateTime<Utc>,

    /// Dispatch priority
    #[serde(default)]
    pub priority: EventPriority,

    /// Name of the module that produced the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_module: Option<String>,

    /// Links events that belong to the same interaction chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Event {
    /// Create a normal-priority event stamped with the current time
    pub fn new(event_type: impl Into<String>, data: EventData) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp: Utc::now(),
            priority: EventPriority::Normal,
            source_module: None,
            correlation_id: None,
        }
    }

    /// Create an event with an empty payload
    pub fn empty(event_type: impl Into<String>) -> Self {
        Self::new(event_type, EventData::new())
    }

    /// Set the dispatch priority
    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the producing module
    pub fn with_source(mut self, source_module: impl Into<String>) -> Self {
        self.source_module = Some(source_module.into());
        self
    }

    /// Set the correlation id
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Add a single payload field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Look up a payload field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Look up a string payload field
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Generate a fresh correlation id
    pub fn new_correlation_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Event types exchanged by the speech and vision modules
pub mod event_types {
    pub const SPEECH_INPUT: &str = "speech.input";
    pub const SPEECH_PROCESSED: &str = "speech.processed";
    pub const SPEECH_PROCESSING_ERROR: &str = "speech.processing_error";
    pub const SPEECH_SYNTHESIZE: &str = "speech.synthesize";
    pub const SPEECH_SYNTHESIZED: &str = "speech.synthesized";
    pub const SPEECH_AUDIO_READY: &str = "speech.audio_ready";
    pub const SPEECH_RECOGNIZE_USER: &str = "speech.recognize_user";
    pub const SPEECH_VOICE_TRAINED: &str = "speech.voice_trained";
    pub const USER_IDENTIFIED: &str = "user.identified";
    pub const INTENT_DETECTED: &str = "intent.detected";
    pub const VISION_ANALYZE_IMAGE: &str = "vision.analyze_image";
    pub const VISION_ANALYZE_VIDEO: &str = "vision.analyze_video";
    pub const VISION_DETECT_OBJECTS: &str = "vision.detect_objects";
    pub const VISION_RECOGNIZE_FACES: &str = "vision.recognize_faces";
    pub const VISION_EXTRACT_TEXT: &str = "vision.extract_text";
}
