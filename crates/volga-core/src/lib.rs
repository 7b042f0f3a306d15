//! # Volga Core
//!
//! The protocol-independent core of the Volga bot library: the canonical
//! event model, filters, routers and the dispatcher.
//!
//! ## Pipeline
//!
//! All inbound messages flow through one pipeline:
//!
//! ```text
//! ┌────────────┐    ┌────────────┐    ┌────────────┐    ┌──────────┐
//! │ LongPoll   │───▶│ Normalizer │───▶│ Dispatcher │───▶│ Handler  │
//! │ (client)   │    │  (event)   │    │ (routers)  │───▶│ Handler  │
//! └────────────┘    └────────────┘    └────────────┘───▶│ Handler  │
//!                                                       └──────────┘
//! ```
//!
//! - [`normalize_message`] turns a raw full-message record into a
//!   [`MessageEvent`], or drops it when the record is unusable.
//! - [`Router`]s hold filter-guarded handlers plus startup callbacks.
//! - [`Dispatcher`] owns the routers and invokes every matching handler in
//!   deterministic registration order.
//!
//! The transport is behind the [`ApiSender`] seam and the outbound queue
//! behind [`OutboundSink`], so this crate carries no HTTP stack of its own.

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod filter;
pub mod router;

pub use context::{ApiSender, EventContext, OutboundSink, Params, random_id};
pub use dispatcher::Dispatcher;
pub use error::{ApiError, ApiResult, PollError, PollResult};
pub use event::{MessageEvent, TokenKind, normalize_message};
pub use filter::Filter;
pub use router::{HandlerFn, MessageHandler, Router, StartupFn};
