//! Single entry point for every registry query
//!
//! `execute` runs one request through cache lookup, rate budget, resilient
//! transport and cache write-back, and always answers with an `Envelope`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use scout_core::error::ScoutError;
use scout_core::types::{Envelope, RateLimitInfo, Request};
use crate::cache::ResultCache;
use crate::rate::RateBudget;
use crate::transport::{ResilientTransport, UpstreamResponse};

type InflightSlot = Arc<OnceCell<Envelope>>;

/// Behavior switches for the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// TTL applied to cached results
    pub cache_ttl: Duration,
    /// Share one upstream call between concurrent identical cacheable requests
    pub coalesce_inflight: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            coalesce_inflight: true,
        }
    }
}

/// Composes rate budget, result cache and transport
#[derive(Debug)]
pub struct RequestCoordinator {
    budget: Arc<RateBudget>,
    cache: Arc<ResultCache>,
    transport: ResilientTransport,
    config: CoordinatorConfig,
    inflight: DashMap<String, InflightSlot>,
}

impl RequestCoordinator {
    pub fn new(
        budget: Arc<RateBudget>,
        cache: Arc<ResultCache>,
        transport: ResilientTransport,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            budget,
            cache,
            transport,
            config,
            inflight: DashMap::new(),
        }
    }

    pub fn budget(&self) -> &RateBudget {
        &self.budget
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Most recent upstream rate-limit telemetry
    pub fn last_rate_limit(&self) -> Option<RateLimitInfo> {
        self.transport.last_rate_limit()
    }

    /// Drop every cached result
    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("result cache cleared");
    }

    /// Run a request and describe the outcome
    pub async fn execute(&self, request: &Request) -> Envelope {
        if let Err(error) = request.validate() {
            debug!(path = request.path(), error = %error, "rejected request before dispatch");
            return Envelope::failure(&error);
        }

        if !request.is_cacheable() {
            return self.fetch(request).await;
        }

        if let Some(value) = self.cache.get(request.cache_key()) {
            debug!(path = request.path(), "cache hit");
            return Envelope::success(value)
                .with_rate_limit(self.last_rate_limit())
                .from_cache();
        }
        debug!(path = request.path(), "cache miss");

        if self.config.coalesce_inflight {
            self.fetch_coalesced(request).await
        } else {
            self.fetch(request).await
        }
    }

    /// Run a request, giving up once `limit` has elapsed.
    ///
    /// The in-flight call is dropped on expiry; budget slots already recorded
    /// stay recorded.
    pub async fn execute_with_timeout(&self, request: &Request, limit: Duration) -> Envelope {
        match tokio::time::timeout(limit, self.execute(request)).await {
            Ok(envelope) => envelope,
            Err(_) => {
                let error = ScoutError::Network {
                    message: format!(
                        "{} {} cancelled after {}ms deadline",
                        request.method(),
                        request.path(),
                        limit.as_millis()
                    ),
                    source: None,
                };
                Envelope::failure(&error).with_rate_limit(self.last_rate_limit())
            }
        }
    }

    async fn fetch_coalesced(&self, request: &Request) -> Envelope {
        let key = request.cache_key();
        let slot = self
            .inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        slot.get_or_init(|| async {
            // A fetch that finished just before this slot was created already wrote the cache
            let envelope = match self.cache.get(key) {
                Some(value) => Envelope::success(value)
                    .with_rate_limit(self.last_rate_limit())
                    .from_cache(),
                None => self.fetch(request).await,
            };
            // Unpublish before the cell is set: a slot reachable from the map is never resolved
            self.inflight.remove_if(key, |_, current| Arc::ptr_eq(current, &slot));
            envelope
        })
        .await
        .clone()
    }

    async fn fetch(&self, request: &Request) -> Envelope {
        let admission = self.budget.admit().await;
        if !admission.waited.is_zero() {
            debug!(
                path = request.path(),
                waited_ms = admission.waited.as_millis() as u64,
                "admitted after rate wait"
            );
        }

        let result = self
            .transport
            .send(request)
            .await
            .and_then(|response| parse_payload(request, &response));

        match &result {
            Ok(value) if request.is_cacheable() => {
                self.cache
                    .set(request.cache_key().to_string(), value.clone(), self.config.cache_ttl);
            }
            Ok(_) => {}
            Err(error) => debug!(path = request.path(), kind = %error.kind(), "request failed"),
        }
        Envelope::from_result(result).with_rate_limit(self.last_rate_limit())
    }
}

/// Parse a 2xx body; an empty body becomes `null`
fn parse_payload(request: &Request, response: &UpstreamResponse) -> Result<Value, ScoutError> {
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&response.body).map_err(|e| ScoutError::InvalidResponse {
        message: format!("{} returned invalid JSON: {}", request.path(), e),
    })
}
