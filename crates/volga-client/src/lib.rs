//! # Volga Client
//!
//! Transport layer for the Volga bot library: the authenticated control API
//! client, token-category detection, long-poll endpoint negotiation and the
//! long-poll event stream.
//!
//! The flow mirrors the platform's session model:
//!
//! ```text
//! ApiClient ──▶ SessionNegotiator ──▶ LongPollStream ──▶ raw updates
//!    │              (token kind,           (cursor,
//!    │               endpoint)              desync recovery)
//!    └──────────── messages.getById ◀───────┘
//! ```
//!
//! [`ApiClient`] implements [`volga_core::ApiSender`], so everything above
//! the transport talks to it through the trait.

pub mod api;
pub mod longpoll;
pub mod session;

pub use api::{ApiClient, DEFAULT_API_VERSION, DEFAULT_BASE_URL};
pub use longpoll::{DEFAULT_WAIT, LongPollStream};
pub use session::{Cursor, Endpoint, SessionNegotiator};
