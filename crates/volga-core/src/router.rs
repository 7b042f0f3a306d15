//! Routers: ordered collections of filtered message handlers.
//!
//! A [`Router`] groups related handlers (one plugin or feature area) together
//! with the startup callbacks that prime it. Handlers are plain async
//! functions taking an `Arc<EventContext>`; registration order is preserved
//! and is the order the dispatcher invokes matches in.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::context::EventContext;
use crate::event::MessageEvent;
use crate::filter::Filter;

/// Type-erased message handler callback.
pub type HandlerFn =
    Arc<dyn Fn(Arc<EventContext>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Type-erased startup callback.
pub type StartupFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A filter-guarded handler registration.
#[derive(Clone)]
pub struct MessageHandler {
    filter: Filter,
    callback: HandlerFn,
}

impl MessageHandler {
    /// Creates a handler from a filter and a callback.
    pub fn new(filter: Filter, callback: HandlerFn) -> Self {
        Self { filter, callback }
    }

    /// Whether this handler's filter accepts the event.
    pub fn matches(&self, event: &MessageEvent) -> bool {
        self.filter.matches(event)
    }

    /// Invokes the callback.
    pub async fn call(&self, ctx: Arc<EventContext>) -> anyhow::Result<()> {
        (self.callback)(ctx).await
    }
}

/// An ordered collection of message handlers and startup callbacks.
///
/// # Example
///
/// ```rust,ignore
/// let router = Router::new("greetings")
///     .on_message(Filter::new().text("hello"), |ctx| async move {
///         ctx.answer("hi there").await?;
///         Ok(())
///     });
/// ```
#[derive(Clone, Default)]
pub struct Router {
    name: Option<String>,
    handlers: Vec<MessageHandler>,
    startup: Vec<StartupFn>,
}

impl Router {
    /// Creates an empty named router.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Creates an empty router without a name.
    pub fn unnamed() -> Self {
        Self::default()
    }

    /// The router's name, if set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Registers a message handler guarded by `filter`.
    ///
    /// Handlers run in registration order for every event the filter accepts.
    pub fn on_message<F, Fut>(mut self, filter: Filter, handler: F) -> Self
    where
        F: Fn(Arc<EventContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let callback: HandlerFn = Arc::new(move |ctx| handler(ctx).boxed());
        self.handlers.push(MessageHandler::new(filter, callback));
        self
    }

    /// Registers a startup callback.
    ///
    /// Startup callbacks run once, in registration order, before the first
    /// poll.
    pub fn on_startup<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let callback: StartupFn = Arc::new(move || callback().boxed());
        self.startup.push(callback);
        self
    }

    /// All registered message handlers, in order.
    pub fn handlers(&self) -> &[MessageHandler] {
        &self.handlers
    }

    /// All registered startup callbacks, in order.
    pub fn startup_handlers(&self) -> &[StartupFn] {
        &self.startup
    }

    /// Number of registered message handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("name", &self.name)
            .field("handlers", &self.handlers.len())
            .field("startup", &self.startup.len())
            .finish()
    }
}
