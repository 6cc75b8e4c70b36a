//! Event bus for module coordination
//!
//! Producers publish [`Event`]s into a priority queue; a single background
//! dispatch loop drains the queue and fans each event out concurrently to
//! every handler subscribed to its type. Handler failures are logged and
//! contained per handler.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::handler::{same_handler, SharedHandler};
use super::history::{EventHistory, EventStats};
use super::types::{Event, EventPriority};
use crate::background::BackgroundTask;
use crate::config::EventBusConfig;

/// Error type for event bus operations
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
}

/// Result type for event bus operations
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Shortest idle wait of the dispatch loop
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Queue slot ordered by (priority, insertion order)
struct QueuedEvent {
    priority: EventPriority,
    seq: u64,
    event: Event,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    // BinaryHeap is a max-heap: the smallest (priority, seq) must compare greatest.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Queue and history, guarded together so an accepted event is always both
/// queued and recorded
struct BusState {
    queue: BinaryHeap<QueuedEvent>,
    next_seq: u64,
    history: EventHistory,
}

#[derive(Debug, Default)]
struct BusCounters {
    published: AtomicU64,
    rejected: AtomicU64,
    dispatched: AtomicU64,
    dropped_no_subscribers: AtomicU64,
    handler_failures: AtomicU64,
}

/// Point-in-time view of the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusStats {
    pub published: u64,
    pub rejected: u64,
    pub dispatched: u64,
    pub dropped_no_subscribers: u64,
    pub handler_failures: u64,
    pub queued: usize,
    pub history_len: usize,
    pub event_types: usize,
    pub running: bool,
}

/// State shared between the bus handle and its dispatch loop
struct BusShared {
    config: EventBusConfig,
    subscribers: RwLock<HashMap<String, Vec<SharedHandler>>>,
    state: Mutex<BusState>,
    notify: Notify,
    counters: BusCounters,
}

impl BusShared {
    async fn dequeue(&self) -> Option<Event> {
        self.state.lock().await.queue.pop().map(|q| q.event)
    }

    /// Offer one event to a snapshot of its subscribers and await them all
    async fn distribute(&self, event: Event) {
        let handlers: Vec<SharedHandler> = self
            .subscribers
            .read()
            .await
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            self.counters
                .dropped_no_subscribers
                .fetch_add(1, Ordering::Relaxed);
            debug!(event_type = %event.event_type, "No subscribers for event type");
            return;
        }

        let event = Arc::new(event);
        let tasks = handlers.iter().map(|handler| {
            let handler = Arc::clone(handler);
            let event = Arc::clone(&event);
            tokio::spawn(async move { handler.handle(&event).await })
        });
        let results = join_all(tasks).await;

        for (handler, result) in handlers.iter().zip(results) {
            let failure = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(join_err) => format!("handler task failed: {}", join_err),
            };
            self.counters.handler_failures.fetch_add(1, Ordering::Relaxed);
            error!(
                event_type = %event.event_type,
                handler = handler.name(),
                "Handler error: {}",
                failure
            );
        }

        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        debug!(
            event_type = %event.event_type,
            handlers = handlers.len(),
            "Event dispatched"
        );
    }
}

async fn run_dispatch_loop(shared: Arc<BusShared>, cancel: CancellationToken) {
    let poll_interval = shared.config.poll_interval.max(MIN_POLL_INTERVAL);
    while !cancel.is_cancelled() {
        match shared.dequeue().await {
            Some(event) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = shared.distribute(event) => {}
                }
            }
            None => {
                // A notify_one issued before we start waiting leaves a permit,
                // so a publish between dequeue and here is not missed.
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::timeout(poll_interval, shared.notify.notified()) => {}
                }
            }
        }
    }
    debug!("Event dispatch loop exited");
}

/// Prioritized, asynchronous publish/subscribe bus
pub struct EventBus {
    shared: Arc<BusShared>,
    dispatcher: Mutex<Option<BackgroundTask>>,
}

impl EventBus {
    /// Create a bus with default settings
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a bus with explicit settings
    pub fn with_config(config: EventBusConfig) -> Self {
        let history = EventHistory::new(config.history_capacity);
        Self {
            shared: Arc::new(BusShared {
                config,
                subscribers: RwLock::new(HashMap::new()),
                state: Mutex::new(BusState {
                    queue: BinaryHeap::new(),
                    next_seq: 0,
                    history,
                }),
                notify: Notify::new(),
                counters: BusCounters::default(),
            }),
            dispatcher: Mutex::new(None),
        }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Settings this bus was built with
    pub fn config(&self) -> &EventBusConfig {
        &self.shared.config
    }

    /// Start the dispatch loop. No-op when already running.
    pub async fn start(&self) {
        let mut dispatcher = self.dispatcher.lock().await;
        if dispatcher.as_ref().is_some_and(BackgroundTask::is_running) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        *dispatcher = Some(BackgroundTask::spawn("event-dispatch", move |cancel| {
            run_dispatch_loop(shared, cancel)
        }));
        info!("Event Bus started");
    }

    /// Stop the dispatch loop and wait for it to exit. No-op when not running.
    ///
    /// Handlers already spawned for an in-flight event keep running; queued
    /// events stay queued until the next `start`.
    pub async fn stop(&self) {
        let task = self.dispatcher.lock().await.take();
        if let Some(task) = task {
            task.shutdown().await;
            info!("Event Bus stopped");
        }
    }

    /// Whether the dispatch loop is running
    pub async fn is_running(&self) -> bool {
        self.dispatcher
            .lock()
            .await
            .as_ref()
            .is_some_and(BackgroundTask::is_running)
    }

    /// Register `handler` for `event_type`
    ///
    /// Returns false when this exact handler is already registered for the type.
    pub async fn subscribe(&self, event_type: &str, handler: SharedHandler) -> bool {
        let mut subscribers = self.shared.subscribers.write().await;
        let handlers = subscribers.entry(event_type.to_string()).or_default();

        if handlers.iter().any(|h| same_handler(h, &handler)) {
            return false;
        }

        debug!(event_type, handler = handler.name(), "Subscribed to event type");
        handlers.push(handler);
        true
    }

    /// Remove a registration. Returns false when it was not registered.
    pub async fn unsubscribe(&self, event_type: &str, handler: &SharedHandler) -> bool {
        let mut subscribers = self.shared.subscribers.write().await;
        let Some(handlers) = subscribers.get_mut(event_type) else {
            return false;
        };

        let Some(pos) = handlers.iter().position(|h| same_handler(h, handler)) else {
            return false;
        };
        handlers.remove(pos);
        if handlers.is_empty() {
            subscribers.remove(event_type);
        }

        debug!(event_type, handler = handler.name(), "Unsubscribed from event type");
        true
    }

    /// Enqueue an event for dispatch and record it in history
    ///
    /// Starts the dispatch loop first when `auto_start` is enabled.
    pub async fn try_publish(&self, event: Event) -> EventBusResult<()> {
        if self.shared.config.auto_start && !self.is_running().await {
            self.start().await;
        }

        let event_type = event.event_type.clone();
        let priority = event.priority;
        {
            let mut state = self.shared.state.lock().await;
            if let Some(capacity) = self.shared.config.queue_capacity {
                if state.queue.len() >= capacity {
                    self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    return Err(EventBusError::QueueFull { capacity });
                }
            }

            let seq = state.next_seq;
            state.next_seq += 1;
            state.history.record(event.clone());
            state.queue.push(QueuedEvent {
                priority,
                seq,
                event,
            });
        }
        self.shared.notify.notify_one();
        self.shared.counters.published.fetch_add(1, Ordering::Relaxed);

        debug!(event_type, %priority, "Published event");
        Ok(())
    }

    /// Publish an event. Returns false only when it could not be enqueued.
    pub async fn publish(&self, event: Event) -> bool {
        let event_type = event.event_type.clone();
        match self.try_publish(event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(event_type, "Error publishing event: {}", e);
                false
            }
        }
    }

    /// Most recent events, oldest first, optionally filtered by type
    ///
    /// A `limit` of zero returns every matching event still in history.
    pub async fn get_event_history(&self, event_type: Option<&str>, limit: usize) -> Vec<Event> {
        self.shared.state.lock().await.history.recent(event_type, limit)
    }

    /// Aggregate counts over the retained history
    pub async fn history_stats(&self) -> EventStats {
        self.shared.state.lock().await.history.stats()
    }

    /// Drop all retained history
    pub async fn clear_history(&self) {
        self.shared.state.lock().await.history.clear();
    }

    /// Number of handlers registered for `event_type`
    pub async fn get_subscriber_count(&self, event_type: &str) -> usize {
        self.shared
            .subscribers
            .read()
            .await
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Event types that currently have at least one subscriber
    pub async fn get_all_event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.shared.subscribers.read().await.keys().cloned().collect();
        types.sort();
        types
    }

    /// Number of events waiting for dispatch
    pub async fn queue_len(&self) -> usize {
        self.shared.state.lock().await.queue.len()
    }

    /// Counters and sizes for introspection
    pub async fn get_stats(&self) -> EventBusStats {
        let (queued, history_len) = {
            let state = self.shared.state.lock().await;
            (state.queue.len(), state.history.len())
        };
        let counters = &self.shared.counters;
        EventBusStats {
            published: counters.published.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            dispatched: counters.dispatched.load(Ordering::Relaxed),
            dropped_no_subscribers: counters.dropped_no_subscribers.load(Ordering::Relaxed),
            handler_failures: counters.handler_failures.load(Ordering::Relaxed),
            queued,
            history_len,
            event_types: self.shared.subscribers.read().await.len(),
            running: self.is_running().await,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
