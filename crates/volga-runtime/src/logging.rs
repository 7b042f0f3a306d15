//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! Initialization is configuration-driven: the base level and format come
//! from [`LoggingConfig`], and `RUST_LOG` takes precedence over the
//! configured level when set.
//!
//! ```rust,ignore
//! let config = VolgaConfig::load()?;
//! logging::init_from_config(&config.logging);
//! ```

use std::ffi::OsStr;
use std::path::Path;

use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggingConfig};

/// Initializes logging from a [`LoggingConfig`].
///
/// Safe to call more than once; only the first initialization wins.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = try_init_from_config(config);
}

/// Like [`init_from_config`] but surfaces initialization failures.
pub fn try_init_from_config(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    macro_rules! init_with_writer {
        ($writer:expr) => {
            match config.format {
                LogFormat::Compact => tracing_subscriber::registry()
                    .with(fmt::layer().compact().with_writer($writer))
                    .with(filter)
                    .try_init(),
                LogFormat::Full => tracing_subscriber::registry()
                    .with(fmt::layer().with_writer($writer))
                    .with(filter)
                    .try_init(),
                LogFormat::Pretty => tracing_subscriber::registry()
                    .with(fmt::layer().pretty().with_writer($writer))
                    .with(filter)
                    .try_init(),
            }
        };
    }

    match &config.file {
        Some(path) => {
            let appender = tracing_appender::rolling::never(
                path.parent().unwrap_or_else(|| Path::new(".")),
                path.file_name().unwrap_or_else(|| OsStr::new("volga.log")),
            );
            init_with_writer!(appender)
        }
        None => init_with_writer!(std::io::stdout),
    }
}
