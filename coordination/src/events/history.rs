//! Bounded event history
//!
//! Keeps the most recent published events for introspection and debugging.
//! The history carries no delivery guarantee: an event is recorded when it
//! is accepted by the bus, whether or not anyone is subscribed to it.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::types::{Event, EventPriority};

/// Default number of events retained
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Append-only ring buffer of published events
#[derive(Debug)]
pub struct EventHistory {
    events: VecDeque<Event>,
    capacity: usize,
}

impl EventHistory {
    /// Create a history holding at most `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    /// Record an event, evicting the oldest entry when full
    pub fn record(&mut self, event: Event) {
        if self.capacity == 0 {
            return;
        }
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Most recent events, oldest first
    ///
    /// Filters by `event_type` when given. A `limit` of zero returns every
    /// matching event.
    pub fn recent(&self, event_type: Option<&str>, limit: usize) -> Vec<Event> {
        let matching: Vec<&Event> = self
            .events
            .iter()
            .filter(|e| event_type.map_or(true, |t| e.event_type == t))
            .collect();

        let skip = if limit == 0 {
            0
        } else {
            matching.len().saturating_sub(limit)
        };

        matching.into_iter().skip(skip).cloned().collect()
    }

    /// Aggregate counts over the retained events
    pub fn stats(&self) -> EventStats {
        let mut stats = EventStats::default();
        for event in &self.events {
            stats.record_event(event);
        }
        stats
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maximum number of retained events
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every retained event
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Counts over the retained history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventStats {
    pub total_events: usize,
    pub by_type: HashMap<String, usize>,
    pub by_priority: HashMap<EventPriority, usize>,
    pub by_source: HashMap<String, usize>,
}

impl EventStats {
    fn record_event(&mut self, event: &Event) {
        self.total_events += 1;
        *self.by_type.entry(event.event_type.clone()).or_insert(0) += 1;
        *self.by_priority.entry(event.priority).or_insert(0) += 1;
        if let Some(source) = &event.source_module {
            *self.by_source.entry(source.clone()).or_insert(0) += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(event_type: &str, n: u64) -> Event {
        Event::empty(event_type).with_field("n", n)
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = EventHistory::new(3);
        for n in 0..5 {
            history.record(numbered("tick", n));
        }

        let events = history.recent(None, 0);
        assert_eq!(events.len(), 3);
        let ns: Vec<u64> = events.iter().map(|e| e.get("n").unwrap().as_u64().unwrap()).collect();
        assert_eq!(ns, vec![2, 3, 4]);
    }

    #[test]
    fn test_recent_filter_and_limit() {
        let mut history = EventHistory::new(10);
        history.record(numbered("a", 1));
        history.record(numbered("b", 2));
        history.record(numbered("a", 3));
        history.record(numbered("a", 4));

        let only_a = history.recent(Some("a"), 2);
        assert_eq!(only_a.len(), 2);
        assert_eq!(only_a[0].get("n").unwrap(), 3);
        assert_eq!(only_a[1].get("n").unwrap(), 4);

        assert_eq!(history.recent(Some("b"), 100).len(), 1);
        assert!(history.recent(Some("missing"), 100).is_empty());
        assert_eq!(history.recent(None, 0).len(), 4);
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let mut history = EventHistory::new(0);
        history.record(numbered("a", 1));
        assert!(history.is_empty());
    }

    #[test]
    fn test_stats() {
        let mut history = EventHistory::new(10);
        history.record(Event::empty("a").with_source("speech"));
        history.record(Event::empty("a").with_priority(EventPriority::High));
        history.record(Event::empty("b").with_source("speech"));

        let stats = history.stats();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.by_type["a"], 2);
        assert_eq!(stats.by_priority[&EventPriority::Normal], 2);
        assert_eq!(stats.by_priority[&EventPriority::High], 1);
        assert_eq!(stats.by_source["speech"], 2);

        history.clear();
        assert_eq!(history.stats().total_events, 0);
    }
}
