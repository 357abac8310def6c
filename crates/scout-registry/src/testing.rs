//! Test doubles shared by transport and coordinator tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use scout_core::types::{RateLimitInfo, Request};
use crate::clock::Clock;
use crate::transport::{Upstream, UpstreamFailure, UpstreamResponse};

type Outcome = Result<UpstreamResponse, UpstreamFailure>;

/// Upstream that replays a script of outcomes and records every call
#[derive(Debug)]
pub(crate) struct ScriptedUpstream {
    clock: Arc<dyn Clock>,
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    calls: Mutex<Vec<(Instant, String)>>,
    latency: Duration,
}

impl ScriptedUpstream {
    /// Every call not covered by the script returns `200 {"ok": true}`
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(ok_json(r#"{"ok":true}"#)),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    pub(crate) fn then(self, outcome: Outcome) -> Self {
        self.script.lock().push_back(outcome);
        self
    }

    pub(crate) fn otherwise(mut self, outcome: Outcome) -> Self {
        self.fallback = outcome;
        self
    }

    /// Simulated time each call takes
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(at, _)| *at).collect()
    }

    pub(crate) fn called_paths(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(_, path)| path.clone()).collect()
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn call(&self, request: &Request) -> Result<UpstreamResponse, UpstreamFailure> {
        self.calls
            .lock()
            .push((self.clock.now(), request.path().to_string()));
        if !self.latency.is_zero() {
            self.clock.sleep(self.latency).await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

pub(crate) fn ok_json(body: &str) -> UpstreamResponse {
    UpstreamResponse::new(200, body)
}

pub(crate) fn status(code: u16) -> UpstreamResponse {
    UpstreamResponse::new(code, "")
}

pub(crate) fn too_many_requests(retry_after_secs: Option<u64>) -> UpstreamResponse {
    UpstreamResponse {
        retry_after: retry_after_secs.map(Duration::from_secs),
        rate_limit: Some(RateLimitInfo::new(60, 0, None)),
        ..UpstreamResponse::new(429, r#"{"message":"Rate limit exceeded"}"#)
    }
}
