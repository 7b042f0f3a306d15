//! The bot runtime: wiring, lifecycle and the main event loop.
//!
//! [`Bot`] ties the layers together: it builds the API client from
//! configuration, owns the dispatcher and the outbound queue, negotiates the
//! long-poll session and runs the poll/dispatch loop until cancelled.
//!
//! ```rust,ignore
//! let mut bot = Bot::from_env()?;
//! bot.register_router(router);
//! bot.run_until_ctrl_c().await?;
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use volga_client::{ApiClient, LongPollStream, SessionNegotiator};
use volga_core::{ApiSender, Dispatcher, EventContext, OutboundSink, Router, normalize_message};

use crate::config::VolgaConfig;
use crate::error::RuntimeResult;
use crate::plugin::Plugin;
use crate::queue::{OutboundQueue, OutboundWorker};

/// A configured bot instance.
pub struct Bot {
    config: VolgaConfig,
    client: Arc<ApiClient>,
    dispatcher: Dispatcher,
    queue: OutboundQueue,
    worker: Option<OutboundWorker>,
    cancel: CancellationToken,
}

impl Bot {
    /// Creates a bot from a validated configuration.
    pub fn new(config: VolgaConfig) -> RuntimeResult<Self> {
        config.validate()?;

        let client = Arc::new(
            ApiClient::new(config.access_token.clone())
                .with_base_url(config.api.base_url.clone())
                .with_api_version(config.api.version.clone())
                .with_timeout(config.api_timeout())
                .with_max_retries(config.api.max_retries)
                .with_retry_delay(config.api_retry_delay()),
        );

        let cancel = CancellationToken::new();
        let (queue, worker) = OutboundQueue::channel(
            Arc::clone(&client) as Arc<dyn ApiSender>,
            config.queue_interval(),
            cancel.clone(),
        );

        Ok(Self {
            config,
            client,
            dispatcher: Dispatcher::new(),
            queue,
            worker: Some(worker),
            cancel,
        })
    }

    /// Creates a bot from `volga.toml` and `VOLGA_*` environment variables.
    pub fn from_env() -> RuntimeResult<Self> {
        Self::new(VolgaConfig::load()?)
    }

    /// Registers a router with the dispatcher.
    pub fn register_router(&mut self, router: Router) {
        debug!(
            router = router.name().unwrap_or("unnamed"),
            handlers = router.handler_count(),
            "Router registered"
        );
        self.dispatcher.add(router);
    }

    /// Registers every router of a plugin.
    pub fn register_plugin(&mut self, plugin: &dyn Plugin) {
        let routers = plugin.routers();
        info!(plugin = plugin.name(), routers = routers.len(), "Plugin registered");
        for router in routers {
            self.dispatcher.add(router);
        }
    }

    /// The shared API client.
    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// The effective configuration.
    pub fn config(&self) -> &VolgaConfig {
        &self.config
    }

    /// A producer handle to the outbound queue.
    pub fn queue(&self) -> OutboundQueue {
        self.queue.clone()
    }

    /// The cancellation token governing the run loop and the queue worker.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests a graceful shutdown of the run loop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the bot until cancelled.
    ///
    /// Startup callbacks fire once before polling begins; the queue worker
    /// runs alongside the loop. Recoverable long-poll trouble is absorbed by
    /// the stream, so an error here means the session is beyond repair.
    pub async fn run(mut self) -> RuntimeResult<()> {
        self.dispatcher.run_startup().await;

        let worker_handle = self.worker.take().map(|worker| tokio::spawn(worker.run()));

        let mut negotiator = SessionNegotiator::new(Arc::clone(&self.client));
        let kind = negotiator.token_kind().await?;
        info!(%kind, routers = self.dispatcher.router_count(), "Bot starting");

        let mut stream = LongPollStream::new(Arc::clone(&self.client), kind)
            .with_wait(self.config.longpoll_wait())
            .with_resync_policy(
                self.config.longpoll.resync_max_attempts,
                self.config.resync_delay(),
            );

        let result = loop {
            let raw = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Shutdown requested, stopping event loop");
                    break Ok(());
                }
                next = stream.next_message() => match next {
                    Ok(raw) => raw,
                    Err(err) => break Err(err.into()),
                },
            };

            let Some(event) = normalize_message(&raw, kind) else {
                warn!("Discarding message without usable id, skipping");
                continue;
            };

            let ctx = Arc::new(EventContext::new(
                event,
                Arc::clone(&self.client) as Arc<dyn ApiSender>,
                Arc::new(self.queue.clone()) as Arc<dyn OutboundSink>,
            ));
            self.dispatcher.dispatch(ctx).await;
        };

        // Stop the worker even when the loop ended in an error.
        self.cancel.cancel();
        if let Some(handle) = worker_handle {
            let _ = handle.await;
        }

        result
    }

    /// Runs the bot until Ctrl-C or cancellation.
    pub async fn run_until_ctrl_c(self) -> RuntimeResult<()> {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                cancel.cancel();
            }
        });
        self.run().await
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("routers", &self.dispatcher.router_count())
            .field("base_url", &self.config.api.base_url)
            .finish()
    }
}
