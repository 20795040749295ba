//! Error types for providers and engine operations.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by an external data provider.
///
/// These never fail a request on their own: callers log them and degrade
/// the bucket or signal the provider was feeding.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// An HTTP request to the provider failed.
    #[error("HTTP error from {source_name}: {message}")]
    Http {
        source_name: String,
        message: String,
    },

    /// The provider returned a rate-limit response.
    #[error("rate limited by {source_name}")]
    RateLimited { source_name: String },

    /// The provider reported an API-level error in an otherwise valid response.
    #[error("{source_name} error {code}: {message}")]
    Api {
        source_name: String,
        code: i64,
        message: String,
    },

    /// A response could not be parsed.
    #[error("parse error from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// An error propagated from `reqwest`.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider needs credentials that are not configured.
    #[error("{source_name} is not configured: {hint}")]
    NotConfigured {
        source_name: String,
        hint: String,
    },
}

impl ProviderError {
    /// Returns `true` when the error is transient and the call may succeed
    /// if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } | Self::RateLimited { .. } => true,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            Self::Api { .. } | Self::Parse { .. } | Self::NotConfigured { .. } => false,
        }
    }
}

/// Convenience alias for provider results.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An error propagated from the core store.
    #[error(transparent)]
    Core(#[from] encore_core::Error),

    /// An operation did not finish within its deadline.
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// A provider call failed where the operation cannot degrade.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl EngineError {
    /// Returns `true` for errors caused by the caller's input
    /// (unknown ids, too few snapshot passes).
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Core(e) => e.is_client_error(),
            Self::Timeout { .. } | Self::Provider(_) => false,
        }
    }
}

/// Convenience alias for engine results.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
