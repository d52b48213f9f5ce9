//! Error types for the Flashpoint client.

use thiserror::Error;

/// Result type alias using the Flashpoint client's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Flashpoint client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream answered with a status the operation cannot use.
    #[error("Upstream error: HTTP {status} for {origin}")]
    Upstream { status: u16, origin: String },

    /// Upstream kept rate-limiting after all retries were spent.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// A response body did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A flattening path expression could not be parsed.
    #[error("Invalid path expression '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_upstream() {
        let err = Error::Upstream {
            status: 500,
            origin: "beta".to_string(),
        };
        assert_eq!(err.to_string(), "Upstream error: HTTP 500 for beta");
    }

    #[test]
    fn test_error_display_rate_limited() {
        let err = Error::RateLimited("search exhausted 3 retries".to_string());
        assert_eq!(err.to_string(), "Rate limited: search exhausted 3 retries");
    }

    #[test]
    fn test_error_display_invalid_path() {
        let err = Error::InvalidPath {
            path: "_source.[".to_string(),
            reason: "unterminated bracket".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid path expression '_source.[': unterminated bracket"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing API token".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing API token");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>(r#"{"hits": nope}"#);
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
