//! # Volga Runtime
//!
//! Orchestration layer for the Volga bot library: configuration loading,
//! logging setup, the outbound call queue and the [`Bot`] lifecycle that
//! ties the client and the dispatcher into one run loop.
//!
//! The typical entry point:
//!
//! ```rust,ignore
//! use volga_runtime::{Bot, logging};
//!
//! let mut bot = Bot::from_env()?;
//! logging::init_from_config(&bot.config().logging);
//! bot.register_router(my_router());
//! bot.run_until_ctrl_c().await?;
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod plugin;
pub mod queue;

pub use bot::Bot;
pub use config::{LogFormat, VolgaConfig};
pub use error::{ConfigError, ConfigResult, RuntimeError, RuntimeResult};
pub use plugin::Plugin;
pub use queue::{DEFAULT_QUEUE_INTERVAL, OutboundQueue, OutboundTask, OutboundWorker};
