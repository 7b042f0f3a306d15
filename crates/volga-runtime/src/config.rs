//! Configuration loading using figment.
//!
//! Sources are layered, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. `volga.toml` in the working directory (or an explicit file)
//! 3. Environment variables with the `VOLGA_` prefix and `__` separator
//!
//! # Environment Variable Mapping
//!
//! - `VOLGA_ACCESS_TOKEN=xxx` → `access_token = "xxx"`
//! - `VOLGA_API__MAX_RETRIES=5` → `api.max_retries = 5`
//! - `VOLGA_LOGGING__LEVEL=debug` → `logging.level = "debug"`

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "volga.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VolgaConfig {
    /// API access token. Required; there is no sensible default.
    #[serde(default)]
    pub access_token: String,

    /// Control API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Long-poll settings.
    #[serde(default)]
    pub longpoll: LongPollConfig,

    /// Outbound queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Control API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Protocol version sent with every request.
    #[serde(default = "default_api_version")]
    pub version: String,

    /// Per-attempt timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum attempts for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in seconds (attempt N sleeps N times this).
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

fn default_base_url() -> String {
    volga_client::DEFAULT_BASE_URL.to_string()
}

fn default_api_version() -> String {
    volga_client::DEFAULT_API_VERSION.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    1
}

/// Long-poll settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongPollConfig {
    /// Server-side hold duration in seconds.
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,

    /// Maximum session re-negotiations before giving up.
    #[serde(default = "default_resync_max_attempts")]
    pub resync_max_attempts: u32,

    /// Initial resync delay in milliseconds; doubles per attempt.
    #[serde(default = "default_resync_delay_ms")]
    pub resync_delay_ms: u64,
}

impl Default for LongPollConfig {
    fn default() -> Self {
        Self {
            wait_secs: default_wait_secs(),
            resync_max_attempts: default_resync_max_attempts(),
            resync_delay_ms: default_resync_delay_ms(),
        }
    }
}

fn default_wait_secs() -> u64 {
    25
}

fn default_resync_max_attempts() -> u32 {
    5
}

fn default_resync_delay_ms() -> u64 {
    500
}

/// Outbound queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Pacing between worker ticks in milliseconds.
    #[serde(default = "default_queue_interval_ms")]
    pub interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_queue_interval_ms(),
        }
    }
}

fn default_queue_interval_ms() -> u64 {
    100
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Optional log file path; stdout when absent.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line compact output.
    #[default]
    Compact,
    /// Default tracing formatter.
    Full,
    /// Multi-line human-oriented output.
    Pretty,
}

impl VolgaConfig {
    /// Loads configuration from the default file and environment.
    pub fn load() -> ConfigResult<Self> {
        Self::load_figment(Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE)))
    }

    /// Loads configuration from a specific file and environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Self::load_figment(Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path)))
    }

    fn load_figment(figment: Figment) -> ConfigResult<Self> {
        let config: Self = figment
            .merge(Env::prefixed("VOLGA_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        debug!(
            base_url = %config.api.base_url,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validates settings that have no usable default.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.access_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(())
    }

    /// Per-attempt API timeout as a duration.
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// API retry base delay as a duration.
    pub fn api_retry_delay(&self) -> Duration {
        Duration::from_secs(self.api.retry_delay_secs)
    }

    /// Long-poll wait as a duration.
    pub fn longpoll_wait(&self) -> Duration {
        Duration::from_secs(self.longpoll.wait_secs)
    }

    /// Initial resync delay as a duration.
    pub fn resync_delay(&self) -> Duration {
        Duration::from_millis(self.longpoll.resync_delay_ms)
    }

    /// Queue pacing interval as a duration.
    pub fn queue_interval(&self) -> Duration {
        Duration::from_millis(self.queue.interval_ms)
    }
}

// =============================================================================
// Tests
// =============================================================================
