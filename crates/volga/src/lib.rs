//! # Volga
//!
//! An async long-poll bot library for the VK messaging platform.
//!
//! ## Overview
//!
//! Volga turns the platform's long-poll feed into a stream of canonical
//! message events and routes them to user handlers through filters. One
//! codebase serves both token categories: account tokens and group tokens
//! negotiate different endpoints and speak different raw formats, and the
//! library hides the difference end to end.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────────┐   ┌────────────┐
//! │ ApiClient │──▶│ LongPollStream│──▶│  Dispatcher  │──▶│  Handlers  │
//! │ (retries) │   │ (cursor,      │   │ (routers &   │   │ (answer /  │
//! │           │   │  resync)      │   │  filters)    │   │  enqueue)  │
//! └───────────┘   └──────────────┘   └──────────────┘   └────────────┘
//!        ▲                                                     │
//!        └──────────────── OutboundQueue (paced worker) ◀──────┘
//! ```
//!
//! - **Client**: retried, timeout-bounded control API calls and the
//!   long-poll session with cursor repair and desync recovery
//! - **Core**: event normalization, filters, routers and the dispatcher
//! - **Runtime**: configuration, logging, the outbound queue and the
//!   [`Bot`](volga_runtime::Bot) lifecycle
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use volga::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut bot = Bot::from_env()?;
//!     logging::init_from_config(&bot.config().logging);
//!
//!     bot.register_router(Router::new("echo").on_message(
//!         Filter::new(),
//!         |ctx| async move {
//!             ctx.answer(ctx.text().to_string()).await?;
//!             Ok(())
//!         },
//!     ));
//!
//!     bot.run_until_ctrl_c().await?;
//!     Ok(())
//! }
//! ```

pub use volga_client as client;
pub use volga_core as core;
pub use volga_runtime as runtime;

pub use volga_runtime::logging;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use volga::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use volga_runtime::{Bot, Plugin, VolgaConfig, logging};

    // Routing - filters, routers and the dispatcher
    pub use volga_core::{Dispatcher, Filter, Router};

    // Handler context and the seams behind it
    pub use volga_core::{ApiSender, EventContext, MessageEvent, OutboundSink, TokenKind};

    // Client - for direct API access outside handlers
    pub use volga_client::{ApiClient, LongPollStream, SessionNegotiator};

    // Error types surfaced to applications
    pub use volga_core::{ApiError, PollError};
    pub use volga_runtime::{RuntimeError, RuntimeResult};
}
