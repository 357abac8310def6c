//! reqwest-backed upstream with connection pooling

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, ClientBuilder};
use tokio::sync::Semaphore;
use tracing::{debug, info};
use url::Url;

use scout_core::error::ScoutError;
use scout_core::types::{Method, RateLimitInfo, Request};
use super::{parse_retry_after, Upstream, UpstreamFailure, UpstreamResponse};
use crate::RegistryResult;

/// Connection and authentication settings for `HttpUpstream`
#[derive(Debug, Clone)]
pub struct HttpUpstreamConfig {
    /// Base URL every request path is appended to
    pub base_url: String,
    /// API key sent as a bearer token
    pub api_key: Option<String>,
    /// Also send the API key as this query parameter (libraries.io reads `api_key`)
    pub api_key_query_param: Option<String>,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Maximum number of requests on the wire at once
    pub max_connections: usize,
    /// Idle keep-alive connections kept per host
    pub pool_max_idle_per_host: usize,
    /// How long an idle connection is kept
    pub pool_idle_timeout: Duration,
    /// User agent header
    pub user_agent: String,
}

impl Default for HttpUpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://libraries.io/api".to_string(),
            api_key: None,
            api_key_query_param: Some("api_key".to_string()),
            timeout: Duration::from_secs(30),
            max_connections: 100,
            pool_max_idle_per_host: 50,
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: concat!("scout/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Main HTTP upstream for registry API calls
#[derive(Debug)]
pub struct HttpUpstream {
    /// Underlying HTTP client with connection pooling
    client: Client,
    /// Base registry URL, without trailing slash
    base_url: String,
    /// Query-parameter credential, if configured
    query_credential: Option<(String, String)>,
    /// Caps concurrent in-flight requests
    connections: Semaphore,
}

impl HttpUpstream {
    /// Create upstream with connection pooling
    pub fn new(config: HttpUpstreamConfig) -> RegistryResult<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| ScoutError::ConfigValidation {
            field: "base_url".to_string(),
            reason: format!("'{}' is not a valid URL: {}", config.base_url, e),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ScoutError::ConfigValidation {
                field: "base_url".to_string(),
                reason: format!("unsupported scheme '{}'", base.scheme()),
            });
        }
        if config.max_connections == 0 {
            return Err(ScoutError::ConfigValidation {
                field: "max_connections".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e| {
                ScoutError::ConfigValidation {
                    field: "api_key".to_string(),
                    reason: format!("Invalid auth token: {}", e),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = ClientBuilder::new()
            // Connection pooling configuration
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            // Request timeout
            .timeout(config.timeout)
            .gzip(true)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| ScoutError::network(format!("Failed to create HTTP client: {}", e), e))?;

        let query_credential = match (&config.api_key_query_param, &config.api_key) {
            (Some(param), Some(key)) => Some((param.clone(), key.clone())),
            _ => None,
        };

        info!(
            base_url = %config.base_url,
            timeout_secs = config.timeout.as_secs(),
            max_connections = config.max_connections,
            "registry upstream ready"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            query_credential,
            connections: Semaphore::new(config.max_connections),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a request, query parameters included
    pub fn url_for(&self, request: &Request) -> Result<Url, UpstreamFailure> {
        let raw = format!("{}/{}", self.base_url, request.path().trim_start_matches('/'));
        let mut url = Url::parse(&raw).map_err(|e| UpstreamFailure::InvalidRequest(e.to_string()))?;

        if !request.query().is_empty() || self.query_credential.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in request.query() {
                pairs.append_pair(key, value);
            }
            if let Some((param, key)) = &self.query_credential {
                pairs.append_pair(param, key);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn call(&self, request: &Request) -> Result<UpstreamResponse, UpstreamFailure> {
        let url = self.url_for(request)?;
        let method = match request.method() {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
        };

        let _permit = self
            .connections
            .acquire()
            .await
            .map_err(|e| UpstreamFailure::Connection(e.to_string()))?;

        debug!(method = %request.method(), path = request.path(), "sending upstream request");
        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let rate_limit = rate_limit_from_headers(response.headers());
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, chrono::Utc::now()));
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(UpstreamResponse {
            status,
            body,
            rate_limit,
            retry_after,
        })
    }
}

/// Read `x-ratelimit-*` telemetry headers
pub fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    RateLimitInfo::from_header_values(
        value("x-ratelimit-limit"),
        value("x-ratelimit-remaining"),
        value("x-ratelimit-reset"),
    )
}

fn map_reqwest_error(error: reqwest::Error) -> UpstreamFailure {
    if error.is_timeout() {
        UpstreamFailure::Timeout
    } else if error.is_builder() {
        UpstreamFailure::InvalidRequest(error.to_string())
    } else {
        UpstreamFailure::Connection(error.to_string())
    }
}
