//! Unified error types for the Volga core library.
//!
//! The taxonomy follows the failure classes of the VK control API and the
//! long-poll feed: transport instability is retryable, everything else is
//! surfaced to the caller immediately.

use thiserror::Error;

// =============================================================================
// API Errors
// =============================================================================

/// Errors produced by control API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server answered with a non-success HTTP status.
    #[error("HTTP error {status}: {reason}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase.
        reason: String,
    },

    /// The response body carried an application-level error envelope.
    #[error("API error {code}: {message}")]
    Api {
        /// Numeric error code from the envelope.
        code: i64,
        /// Human-readable message from the envelope.
        message: String,
    },

    /// The request failed at the network level.
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The response body could not be decoded.
    #[error("malformed response body: {0}")]
    Json(String),
}

impl ApiError {
    /// Whether this error class is worth retrying.
    ///
    /// Only transport instability qualifies; HTTP and application errors are
    /// deterministic and retrying them would just repeat the failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

// =============================================================================
// Long Poll Errors
// =============================================================================

/// Errors produced by the long-poll session.
///
/// Recoverable conditions (cursor gaps, key rotation) are handled inside the
/// stream and never show up here.
#[derive(Debug, Error)]
pub enum PollError {
    /// Endpoint negotiation failed.
    #[error("long poll negotiation failed: {0}")]
    Negotiation(ApiError),

    /// The poll request itself failed past the retry limit.
    #[error("long poll request failed: {0}")]
    Request(ApiError),

    /// The session could not be re-established after repeated desyncs.
    #[error("long poll resync failed after {attempts} attempts")]
    ResyncExhausted {
        /// How many re-negotiation attempts were made.
        attempts: u32,
    },

    /// The server returned a response the client cannot interpret.
    #[error("malformed long poll response: {0}")]
    BadResponse(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for control API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for long-poll operations.
pub type PollResult<T> = Result<T, PollError>;
