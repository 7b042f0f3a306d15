//! Event dispatcher: the explicit router registry.
//!
//! The dispatcher owns every registered [`Router`] and fans each normalized
//! event out to all matching handlers. There is no hidden process-wide
//! registry; tests and embedders can hold as many independent dispatchers as
//! they like.
//!
//! Dispatch order is deterministic: routers in registration order, handlers
//! in registration order within each router, all matches invoked sequentially
//! with no short-circuit. A failing handler is caught, logged and skipped so
//! the remaining handlers still see the event.

use std::sync::Arc;

use tracing::{Level, debug, error, span};

use crate::context::EventContext;
use crate::router::Router;

/// Registry of routers plus the dispatch loop over them.
#[derive(Clone, Default)]
pub struct Dispatcher {
    routers: Vec<Router>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a router. Routers are visited in registration order.
    pub fn add(&mut self, router: Router) {
        self.routers.push(router);
    }

    /// Registers a router (builder form).
    pub fn with(mut self, router: Router) -> Self {
        self.routers.push(router);
        self
    }

    /// Number of registered routers.
    pub fn router_count(&self) -> usize {
        self.routers.len()
    }

    /// Registered routers, in order.
    pub fn routers(&self) -> &[Router] {
        &self.routers
    }

    /// Runs every startup callback once, in registration order.
    ///
    /// A failing callback is logged and must not prevent the remaining
    /// callbacks (or the poll loop) from proceeding.
    pub async fn run_startup(&self) {
        for router in &self.routers {
            for (index, callback) in router.startup_handlers().iter().enumerate() {
                if let Err(error) = callback().await {
                    error!(
                        router = router.name().unwrap_or("unnamed"),
                        index,
                        %error,
                        "Startup callback failed"
                    );
                }
            }
        }
    }

    /// Dispatches one event to every matching handler.
    ///
    /// Returns the number of handlers that matched. Handler errors are
    /// contained per handler: logged, then dispatch continues with the next
    /// match for the same event.
    pub async fn dispatch(&self, ctx: Arc<EventContext>) -> usize {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            message_id = ctx.message_id(),
            peer_id = ctx.peer_id()
        );
        let _enter = span.enter();

        let mut matched = 0;

        for router in &self.routers {
            for (index, handler) in router.handlers().iter().enumerate() {
                if !handler.matches(ctx.event()) {
                    continue;
                }
                matched += 1;
                if let Err(error) = handler.call(Arc::clone(&ctx)).await {
                    error!(
                        router = router.name().unwrap_or("unnamed"),
                        handler = index,
                        %error,
                        "Handler failed"
                    );
                }
            }
        }

        debug!(matched, "Event dispatched");
        matched
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router_count", &self.routers.len())
            .finish()
    }
}
