//! Resilient HTTP transport with bounded retries and backoff
//!
//! `Upstream` performs exactly one attempt; `ResilientTransport` decides what
//! to do with its outcome: return, retry after a backoff, honor `Retry-After`,
//! or fail with a classified error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use scout_core::error::ScoutError;
use scout_core::types::{RateLimitInfo, Request};
use crate::clock::{Clock, TokioClock};
use crate::RegistryResult;

pub mod http;

pub use http::{HttpUpstream, HttpUpstreamConfig};

/// Longest error message kept from an upstream body
const MAX_ERROR_MESSAGE_LEN: usize = 512;

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Upper bound on an honored `Retry-After`
    pub max_retry_after: Duration,
    /// Add up to 10% random delay on top of each backoff
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retry_after: Duration::from_secs(300),
            jitter: true,
        }
    }
}

/// Backoff before retry number `attempt + 1`: `base * 2^attempt`, capped at `cap`
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(cap).min(cap)
}

/// Add uniform jitter in `[0, delay / 10]`
pub fn with_jitter(delay: Duration) -> Duration {
    let spread = delay / 10;
    if spread.is_zero() {
        return delay;
    }
    delay + spread.mul_f64(rand::thread_rng().gen::<f64>())
}

/// Parse a `Retry-After` value given as delta-seconds or an HTTP date
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc).signed_duration_since(now);
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

/// Pull a human-readable message out of an error body
pub fn extract_error_message(body: &str) -> String {
    let message = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("message")
            .or_else(|| map.get("error"))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        _ => body.trim().to_string(),
    };

    if message.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = message.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{}...", truncated)
    } else {
        message
    }
}

/// Response of a single upstream attempt
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: String,
    /// Rate-limit telemetry headers, when present
    pub rate_limit: Option<RateLimitInfo>,
    /// Parsed `Retry-After` header, when present
    pub retry_after: Option<Duration>,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            rate_limit: None,
            retry_after: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure of a single attempt before any response arrived
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request could not be built: {0}")]
    InvalidRequest(String),
}

/// Performs one attempt against the upstream API
#[async_trait]
pub trait Upstream: std::fmt::Debug + Send + Sync {
    async fn call(&self, request: &Request) -> Result<UpstreamResponse, UpstreamFailure>;
}

/// Transport that retries transient failures within a bounded budget.
///
/// A 429 consumes a retry attempt like any other transient failure; its wait
/// is the upstream `Retry-After` when given, otherwise the regular backoff.
#[derive(Debug)]
pub struct ResilientTransport {
    upstream: Arc<dyn Upstream>,
    retry_config: RetryConfig,
    clock: Arc<dyn Clock>,
    last_rate_limit: RwLock<Option<RateLimitInfo>>,
}

impl ResilientTransport {
    /// Create transport driven by the tokio timer
    pub fn new(upstream: Arc<dyn Upstream>, retry_config: RetryConfig) -> Self {
        Self::with_clock(upstream, retry_config, Arc::new(TokioClock))
    }

    /// Create transport with an explicit clock
    pub fn with_clock(
        upstream: Arc<dyn Upstream>,
        retry_config: RetryConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            upstream,
            retry_config,
            clock,
            last_rate_limit: RwLock::new(None),
        }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    /// Most recent telemetry reported by the upstream
    pub fn last_rate_limit(&self) -> Option<RateLimitInfo> {
        self.last_rate_limit.read().clone()
    }

    /// Send request, retrying transient failures
    pub async fn send(&self, request: &Request) -> RegistryResult<UpstreamResponse> {
        let max_retries = if request.is_retryable() {
            self.retry_config.max_retries
        } else {
            0
        };
        let mut attempt = 0u32;

        loop {
            let (error, retry_after) = match self.upstream.call(request).await {
                Ok(response) => {
                    if let Some(info) = &response.rate_limit {
                        *self.last_rate_limit.write() = Some(info.clone());
                    }

                    if response.is_success() {
                        return Ok(response);
                    }

                    let error = classify_status(request, &response);
                    if !error.is_retryable() {
                        debug!(status = response.status, path = request.path(), "non-retryable upstream status");
                        return Err(error);
                    }
                    (error, response.retry_after.filter(|_| response.status == 429))
                }
                Err(UpstreamFailure::InvalidRequest(reason)) => {
                    return Err(ScoutError::validation("request", reason));
                }
                Err(failure) => {
                    let error = ScoutError::Network {
                        message: format!("{} {} failed: {}", request.method(), request.path(), failure),
                        source: Some(Box::new(failure)),
                    };
                    (error, None)
                }
            };

            if attempt >= max_retries {
                return Err(error);
            }

            let delay = match retry_after {
                Some(wait) => wait.min(self.retry_config.max_retry_after),
                None => self.backoff(attempt),
            };
            warn!(
                attempt = attempt + 1,
                max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying upstream request"
            );
            self.clock.sleep(delay).await;
            attempt += 1;
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let delay = backoff_delay(attempt, self.retry_config.base_delay, self.retry_config.max_delay);
        if self.retry_config.jitter {
            with_jitter(delay)
        } else {
            delay
        }
    }
}

/// Map a non-2xx status to the error taxonomy
pub fn classify_status(request: &Request, response: &UpstreamResponse) -> ScoutError {
    let message = extract_error_message(&response.body);
    let message = if message.is_empty() {
        request.path().to_string()
    } else {
        format!("{} ({})", message, request.path())
    };

    match response.status {
        401 => ScoutError::Authentication { message },
        404 => ScoutError::PackageNotFound { message },
        429 => ScoutError::RateLimit {
            message,
            retry_after: response.retry_after,
        },
        status @ 500..=599 => ScoutError::Network {
            message: format!("upstream server error {}: {}", status, message),
            source: None,
        },
        status => ScoutError::UpstreamRejected { status, message },
    }
}
