//! Uniform result envelope.
//!
//! Every query returns an `Envelope`; no error crosses the coordinator as a
//! Rust `Err`. A successful envelope always carries data and never an error
//! descriptor, and the other way round.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RateLimitInfo;
use crate::error::{ErrorKind, ScoutError};

/// Failure details carried by an envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl From<&ScoutError> for ErrorDescriptor {
    fn from(error: &ScoutError) -> Self {
        let retry_after_secs = match error {
            ScoutError::RateLimit { retry_after, .. } => retry_after.map(|d| d.as_secs()),
            _ => None,
        };

        Self {
            kind: error.kind(),
            message: error.to_string(),
            status: error.status(),
            retry_after_secs,
        }
    }
}

/// Result of one coordinated request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit: Option<RateLimitInfo>,
    #[serde(default)]
    cached: bool,
}

impl Envelope {
    /// Successful envelope around a parsed payload
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            rate_limit: None,
            cached: false,
        }
    }

    /// Failed envelope describing an error
    pub fn failure(error: &ScoutError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorDescriptor::from(error)),
            rate_limit: None,
            cached: false,
        }
    }

    pub fn from_result(result: Result<Value, ScoutError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(error) => Self::failure(&error),
        }
    }

    /// Attach upstream telemetry
    pub fn with_rate_limit(mut self, rate_limit: Option<RateLimitInfo>) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Mark the envelope as served from the result cache
    pub fn from_cache(mut self) -> Self {
        self.cached = true;
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorDescriptor> {
        self.error.as_ref()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn rate_limit(&self) -> Option<&RateLimitInfo> {
        self.rate_limit.as_ref()
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_success_envelope() {
        let envelope = Envelope::success(json!({"name": "serde"}));

        assert!(envelope.is_success());
        assert!(envelope.error().is_none());
        assert!(!envelope.is_cached());
        assert_eq!(envelope.data().unwrap()["name"], "serde");
    }

    #[test]
    fn test_failure_envelope() {
        let error = ScoutError::PackageNotFound { message: "npm/nope".into() };
        let envelope = Envelope::failure(&error);

        assert!(!envelope.is_success());
        assert!(envelope.data().is_none());
        assert_eq!(envelope.error_kind(), Some(ErrorKind::PackageNotFoundError));
        assert_eq!(envelope.error().unwrap().status, Some(404));
        assert!(envelope.error().unwrap().message.contains("npm/nope"));
    }

    #[test]
    fn test_rate_limit_descriptor_keeps_retry_after() {
        let error = ScoutError::RateLimit {
            message: "too many".into(),
            retry_after: Some(Duration::from_secs(7)),
        };
        let descriptor = ErrorDescriptor::from(&error);

        assert_eq!(descriptor.kind, ErrorKind::RateLimitError);
        assert_eq!(descriptor.retry_after_secs, Some(7));
    }

    #[test]
    fn test_serialized_shape() {
        let envelope = Envelope::success(json!([1, 2]))
            .with_rate_limit(Some(RateLimitInfo::new(60, 59, None)))
            .from_cache();
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["cached"], true);
        assert_eq!(value["rate_limit"]["remaining"], 59);
        assert!(value.get("error").is_none());

        let failed = serde_json::to_value(Envelope::failure(&ScoutError::validation("q", "empty")))
            .unwrap();
        assert_eq!(failed["error"]["kind"], "ValidationError");
        assert!(failed.get("data").is_none());
    }
}
