//! Error types and result aliases for Scout operations.
//!
//! Provides a unified error type that covers every failure the request-access
//! layer can observe, plus the stable `ErrorKind` that callers see in envelopes.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Scout operations
#[derive(Error, Debug)]
pub enum ScoutError {
    // Request errors
    #[error("Invalid request field '{field}': {reason}")]
    Validation { field: String, reason: String },

    // Upstream errors
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Resource not found: {message}")]
    PackageNotFound { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Upstream returned status {status}: {message}")]
    UpstreamRejected { status: u16, message: String },

    #[error("Invalid response from upstream: {message}")]
    InvalidResponse { message: String },

    // Config errors
    #[error("Failed to parse {file}: {message} at line {line}, column {column}")]
    TomlParse {
        file: String,
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for Scout operations
pub type ScoutResult<T> = Result<T, ScoutError>;

/// Stable error classification exposed to callers.
///
/// The serialized names are part of the envelope contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ValidationError,
    AuthenticationError,
    PackageNotFoundError,
    RateLimitError,
    NetworkError,
    UpstreamError,
    InvalidResponse,
    ConfigError,
    IoError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::AuthenticationError => "AuthenticationError",
            ErrorKind::PackageNotFoundError => "PackageNotFoundError",
            ErrorKind::RateLimitError => "RateLimitError",
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::UpstreamError => "UpstreamError",
            ErrorKind::InvalidResponse => "InvalidResponse",
            ErrorKind::ConfigError => "ConfigError",
            ErrorKind::IoError => "IoError",
        }
    }

    /// Actionable hint for errors of this kind
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ErrorKind::ValidationError => Some("Check the arguments passed to the query"),
            ErrorKind::AuthenticationError => {
                Some("Check that SCOUT_API_KEY holds a valid registry API key")
            },
            ErrorKind::PackageNotFoundError => {
                Some("Check the package name and platform spelling or try a search")
            },
            ErrorKind::RateLimitError => {
                Some("Wait for the rate limit window to reset or lower rate_limit_requests")
            },
            ErrorKind::NetworkError => Some("Check your internet connection and try again"),
            ErrorKind::ConfigError => {
                Some("Fix the value in scout.toml or the matching SCOUT_* variable")
            },
            ErrorKind::UpstreamError | ErrorKind::InvalidResponse | ErrorKind::IoError => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScoutError {
    /// Create a validation error for a request field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Stable kind reported in envelopes
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScoutError::Validation { .. } => ErrorKind::ValidationError,
            ScoutError::Authentication { .. } => ErrorKind::AuthenticationError,
            ScoutError::PackageNotFound { .. } => ErrorKind::PackageNotFoundError,
            ScoutError::RateLimit { .. } => ErrorKind::RateLimitError,
            ScoutError::Network { .. } => ErrorKind::NetworkError,
            ScoutError::UpstreamRejected { .. } => ErrorKind::UpstreamError,
            ScoutError::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            ScoutError::TomlParse { .. } | ScoutError::ConfigValidation { .. } => {
                ErrorKind::ConfigError
            },
            ScoutError::Io { .. } => ErrorKind::IoError,
        }
    }

    /// HTTP status associated with this error, when one was observed
    pub fn status(&self) -> Option<u16> {
        match self {
            ScoutError::Authentication { .. } => Some(401),
            ScoutError::PackageNotFound { .. } => Some(404),
            ScoutError::RateLimit { .. } => Some(429),
            ScoutError::UpstreamRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this error is transient and worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScoutError::Network { .. } | ScoutError::RateLimit { .. })
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        self.kind().suggestion()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ScoutError::validation("name", "empty").kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(
            ScoutError::PackageNotFound { message: "x".into() }.kind(),
            ErrorKind::PackageNotFoundError
        );
        assert_eq!(
            ScoutError::UpstreamRejected { status: 403, message: "no".into() }.kind(),
            ErrorKind::UpstreamError
        );
        assert_eq!(
            ScoutError::ConfigValidation { field: "f".into(), reason: "r".into() }.kind(),
            ErrorKind::ConfigError
        );
    }

    #[test]
    fn test_retryable_classes() {
        let network = ScoutError::Network { message: "reset".into(), source: None };
        let limited = ScoutError::RateLimit { message: "slow down".into(), retry_after: None };
        let auth = ScoutError::Authentication { message: "bad key".into() };

        assert!(network.is_retryable());
        assert!(limited.is_retryable());
        assert!(!auth.is_retryable());
        assert!(!ScoutError::validation("page", "zero").is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ScoutError::Authentication { message: String::new() }.status(), Some(401));
        assert_eq!(ScoutError::PackageNotFound { message: String::new() }.status(), Some(404));
        assert_eq!(ScoutError::validation("a", "b").status(), None);
    }

    #[test]
    fn test_kind_serializes_to_stable_name() {
        let json = serde_json::to_string(&ErrorKind::RateLimitError).unwrap();
        assert_eq!(json, "\"RateLimitError\"");
        assert_eq!(ErrorKind::NetworkError.to_string(), "NetworkError");
    }

    #[test]
    fn test_suggestions() {
        assert!(ScoutError::Authentication { message: String::new() }
            .suggestion()
            .unwrap()
            .contains("SCOUT_API_KEY"));
        assert!(ScoutError::InvalidResponse { message: String::new() }.suggestion().is_none());
    }
}
