//! Event handler calling convention
//!
//! Every subscriber is invoked through the async [`EventHandler`] trait.
//! Synchronous callbacks are adapted with [`BlockingHandler`], which runs
//! them on tokio's blocking pool so they cannot stall the dispatch loop.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::types::Event;

/// Shared reference to a subscribed handler
///
/// Handler identity is the identity of this `Arc`: subscribing the same
/// `Arc` twice is a no-op, subscribing a clone of the inner value is not.
pub type SharedHandler = Arc<dyn EventHandler>;

/// Receives events of the types it is subscribed to
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one event. Errors are logged by the bus and never reach the publisher.
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;

    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Whether two handler references point at the same handler
pub fn same_handler(a: &SharedHandler, b: &SharedHandler) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Handler backed by an async closure
///
/// The closure receives an owned copy of the event so the returned future
/// can be `'static`.
pub struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// Wrap into a [`SharedHandler`] ready for subscription
    pub fn shared(self) -> SharedHandler {
        Arc::new(self)
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.func)(event.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handler backed by a synchronous closure, run on the blocking pool
pub struct BlockingHandler<F> {
    name: String,
    func: Arc<F>,
}

impl<F> BlockingHandler<F>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Wrap into a [`SharedHandler`] ready for subscription
    pub fn shared(self) -> SharedHandler {
        Arc::new(self)
    }
}

#[async_trait]
impl<F> EventHandler for BlockingHandler<F>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        let func = Arc::clone(&self.func);
        let event = event.clone();
        tokio::task::spawn_blocking(move || func(&event)).await?
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Named;

    #[async_trait]
    impl EventHandler for Named {
        async fn handle(&self, _event: &Event) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fn_handler_receives_event() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let handler = FnHandler::new("counter", move |event: Event| {
            let counter = Arc::clone(&counter);
            async move {
                assert_eq!(event.event_type, "speech.input");
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(())
            }
        });

        handler.handle(&Event::empty("speech.input")).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(handler.name(), "counter");
    }

    #[tokio::test]
    async fn test_blocking_handler_propagates_error() {
        let handler = BlockingHandler::new("failing", |_event: &Event| {
            anyhow::bail!("sync failure")
        });

        let err = handler.handle(&Event::empty("x")).await.unwrap_err();
        assert!(err.to_string().contains("sync failure"));
    }

    #[tokio::test]
    async fn test_blocking_handler_panic_becomes_error() {
        let handler = BlockingHandler::new("panicking", |_event: &Event| -> anyhow::Result<()> {
            panic!("boom")
        });

        assert!(handler.handle(&Event::empty("x")).await.is_err());
    }

    #[test]
    fn test_handler_identity() {
        let a: SharedHandler = Arc::new(Named);
        let b: SharedHandler = Arc::new(Named);
        let a2 = Arc::clone(&a);

        assert!(same_handler(&a, &a2));
        assert!(!same_handler(&a, &b));
        assert!(a.name().ends_with("Named"));
    }
}
