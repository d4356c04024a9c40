//! API Error Types
//!
//! Every call into the LivSync API returns a typed failure instead of
//! rejecting silently. Views use [`ApiError::is_retryable`] to decide whether
//! to offer a retry.

use thiserror::Error;

/// Coarse classification of an API failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Could not reach the server
    Network,
    /// Server did not answer in time
    Timeout,
    /// Server answered with a non-2xx status
    Status,
    /// Response body was not the expected JSON
    Decode,
    /// No session identity to address the request with
    MissingIdentity,
    /// Client is misconfigured
    Config,
}

/// API client errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API unavailable: {0}")]
    Unavailable(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("No user identity in the current session")]
    MissingIdentity,

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unavailable(_) | ApiError::Request(_) => ErrorKind::Network,
            ApiError::Timeout => ErrorKind::Timeout,
            ApiError::Status { .. } => ErrorKind::Status,
            ApiError::Decode(_) => ErrorKind::Decode,
            ApiError::MissingIdentity => ErrorKind::MissingIdentity,
            ApiError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Unavailable(_) | ApiError::Timeout | ApiError::Request(_) => true,
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::Decode(_) | ApiError::MissingIdentity | ApiError::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_connect() {
            ApiError::Unavailable(e.to_string())
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Request(e)
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let err = |status| ApiError::Status {
            status,
            message: String::new(),
        };

        assert!(err(500).is_retryable());
        assert!(err(503).is_retryable());
        assert!(err(429).is_retryable());
        assert!(!err(404).is_retryable());
        assert!(!err(422).is_retryable());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ApiError::Timeout.kind(), ErrorKind::Timeout);
        assert!(ApiError::Timeout.is_retryable());
        assert_eq!(ApiError::Decode("x".into()).kind(), ErrorKind::Decode);
        assert!(!ApiError::MissingIdentity.is_retryable());
    }

    #[test]
    fn test_display() {
        let err = ApiError::Status {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "API error 502: bad gateway");
    }
}
