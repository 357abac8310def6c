//! Upstream rate-limit telemetry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rate-limit state as reported by the upstream service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Requests allowed per upstream window
    pub limit: u64,
    /// Requests left in the current window
    pub remaining: u64,
    /// Requests already spent in the current window
    pub used: u64,
    /// When the upstream window resets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<DateTime<Utc>>,
}

impl RateLimitInfo {
    pub fn new(limit: u64, remaining: u64, reset: Option<DateTime<Utc>>) -> Self {
        Self {
            limit,
            remaining,
            used: limit.saturating_sub(remaining),
            reset,
        }
    }

    /// Build telemetry from raw header values.
    ///
    /// `limit` and `remaining` are required; `reset` is a unix timestamp in
    /// seconds and may carry a fractional part.
    pub fn from_header_values(
        limit: Option<&str>,
        remaining: Option<&str>,
        reset: Option<&str>,
    ) -> Option<Self> {
        let limit = limit?.trim().parse::<u64>().ok()?;
        let remaining = remaining?.trim().parse::<u64>().ok()?;
        let reset = reset
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0));

        Some(Self::new(limit, remaining, reset))
    }

    /// True once the upstream reports no requests left
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}
