//! Unified error handling for forgestore-core

use thiserror::Error;

use crate::net::ratelimit::RateLimitSnapshot;

/// Core error type for forgestore-core
///
/// Every network operation in this crate resolves to a `Result<T, ApiError>`;
/// nothing is allowed to panic or escape as a raw transport error.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The provider's request quota is exhausted
    #[error("{} API rate limit exceeded", snapshot.provider)]
    RateLimitExceeded { snapshot: RateLimitSnapshot },

    /// The provider rejected the request for missing/invalid credentials
    #[error("Authentication required for {0}")]
    AuthRequired(crate::models::Provider),

    /// Non-2xx response that is not a rate-limit or auth condition
    #[error("HTTP {status}: {description}")]
    Http { status: u16, description: String },

    /// Request never produced a response (timeout, DNS, connection, I/O)
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be deserialized into the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Token refresh failed; the stored token has been cleared
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Construction-time misconfiguration (missing client id, bad base URL)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for forgestore-core
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ApiError::Config(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        ApiError::Network(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        ApiError::Decode(msg.into())
    }

    /// True for errors the transport layer may transparently retry
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_))
            || matches!(self, ApiError::Http { status, .. } if (500..600).contains(status))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
