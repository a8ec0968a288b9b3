//! Error types for price fetching and startup configuration

use thiserror::Error;

/// Errors returned by a price source for a single request
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection failure, DNS error or request timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream throttling (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Any other non-2xx response
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Payload did not have the expected shape
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The coin id is unknown to the price source
    #[error("Coin not found: {0}")]
    NotFound(String),
}

/// Coarse classification of a [`FetchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    RateLimited,
    Malformed,
    NotFound,
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Network(_) | FetchError::Http { .. } => FailureKind::Transient,
            FetchError::RateLimited(_) => FailureKind::RateLimited,
            FetchError::Malformed(_) => FailureKind::Malformed,
            FetchError::NotFound(_) => FailureKind::NotFound,
        }
    }

    /// Whether the error should abort startup instead of being retried
    pub fn is_fatal(&self) -> bool {
        self.kind() == FailureKind::NotFound
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Malformed(e.to_string())
    }
}

/// Invalid settings detected at startup. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SMA window size must be positive, got {0}")]
    InvalidWindow(usize),

    #[error("Invalid coin id '{0}': expected lowercase letters, digits or '-'")]
    InvalidCoin(String),

    #[error("Invalid quote currency '{0}'")]
    InvalidCurrency(String),

    #[error("Backoff base interval ({base}s) must be positive and not exceed the cap ({max}s)")]
    InvalidBackoff { base: u64, max: u64 },

    #[error("Diagnostic cadence must be at least 1 failure")]
    InvalidLogEvery,

    #[error("Request timeout must be positive")]
    InvalidTimeout,

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
