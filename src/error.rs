//! Error types for the Lyra response pipeline

use thiserror::Error;

use crate::providers::Capability;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a single provider failure, as recorded by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Provider rejected the call due to rate limiting (HTTP 429)
    RateLimited,
    /// Provider did not answer within its timeout
    TimedOut,
    /// Any other provider failure
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Other => write!(f, "failed"),
        }
    }
}

/// One provider's failure inside an exhausted failover sweep
#[derive(Debug, Clone)]
pub struct FailureRecord {
    /// Provider name
    pub provider: String,
    /// Failure classification
    pub kind: FailureKind,
    /// Human-readable detail
    pub message: String,
}

/// Errors that can occur in the pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider hit its rate limit
    #[error("[{provider}] rate limit exceeded")]
    RateLimited {
        /// Provider name
        provider: String,
        /// Seconds to wait before retrying, when the provider says
        retry_after: Option<f64>,
    },

    /// Provider request timed out
    #[error("[{provider}] request timed out after {seconds:.0}s")]
    Timeout {
        /// Provider name
        provider: String,
        /// Timeout that was exceeded
        seconds: f64,
    },

    /// Generic provider failure
    #[error("[{provider}] {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Failure detail
        message: String,
    },

    /// Every provider for one capability failed within a single call
    #[error("all {capability} providers failed: {}", failed_providers(.failures))]
    AllProvidersFailed {
        /// Capability whose provider set is exhausted
        capability: Capability,
        /// One record per failed provider, in attempt order
        failures: Vec<FailureRecord>,
    },

    /// Tool call exceeded the hard timeout
    #[error("tool {0} timed out")]
    ToolTimeout(String),

    /// Tool execution error (unknown name or internal failure)
    #[error("tool error: {0}")]
    Tool(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Comma-separated provider names for the aggregate error message
fn failed_providers(failures: &[FailureRecord]) -> String {
    failures
        .iter()
        .map(|record| record.provider.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// How the router records this error when failing over.
    ///
    /// Anything that is not an explicit rate limit or timeout counts as
    /// a generic failure; nothing is swallowed.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::Timeout { .. } => FailureKind::TimedOut,
            _ => FailureKind::Other,
        }
    }
}
