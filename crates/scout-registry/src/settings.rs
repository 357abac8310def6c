//! Construction of a complete coordinator from plain settings

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use scout_core::error::ScoutError;
use crate::cache::ResultCache;
use crate::coordinator::{CoordinatorConfig, RequestCoordinator};
use crate::rate::RateBudget;
use crate::transport::{HttpUpstream, HttpUpstreamConfig, ResilientTransport, RetryConfig};
use crate::RegistryResult;

/// Every knob the access layer reads at construction time
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub upstream: HttpUpstreamConfig,
    pub retry: RetryConfig,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    pub cache_max_entries: usize,
    pub coordinator: CoordinatorConfig,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            upstream: HttpUpstreamConfig::default(),
            retry: RetryConfig::default(),
            rate_limit_requests: 60,
            rate_limit_window: Duration::from_secs(60),
            cache_max_entries: 1000,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl RequestCoordinator {
    /// Build the full stack over a reqwest upstream
    pub fn from_settings(settings: &RegistrySettings) -> RegistryResult<Self> {
        let budget = RateBudget::new(settings.rate_limit_requests, settings.rate_limit_window)?;

        let capacity = NonZeroUsize::new(settings.cache_max_entries).ok_or_else(|| {
            ScoutError::ConfigValidation {
                field: "cache_max_entries".to_string(),
                reason: "must be at least 1".to_string(),
            }
        })?;
        let cache = ResultCache::new(capacity, settings.coordinator.cache_ttl);

        let upstream = HttpUpstream::new(settings.upstream.clone())?;
        let transport = ResilientTransport::new(Arc::new(upstream), settings.retry.clone());

        Ok(Self::new(
            Arc::new(budget),
            Arc::new(cache),
            transport,
            settings.coordinator.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use scout_core::error::ErrorKind;
    use scout_core::types::Request;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_from_default_settings() {
        let coordinator = RequestCoordinator::from_settings(&RegistrySettings::default()).unwrap();

        assert_eq!(coordinator.budget().max_requests(), 60);
        assert_eq!(coordinator.budget().window(), Duration::from_secs(60));
        assert_eq!(coordinator.cache().capacity(), 1000);
        assert_eq!(coordinator.cache().default_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_rejects_degenerate_settings() {
        let zero_budget = RegistrySettings {
            rate_limit_requests: 0,
            ..RegistrySettings::default()
        };
        assert!(RequestCoordinator::from_settings(&zero_budget).is_err());

        let zero_cache = RegistrySettings {
            cache_max_entries: 0,
            ..RegistrySettings::default()
        };
        assert!(RequestCoordinator::from_settings(&zero_cache).is_err());
    }

    #[tokio::test]
    async fn test_end_to_end_against_http_server() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/npm/express"))
            .and(header("Authorization", "Bearer e2e-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-ratelimit-limit", "60")
                    .insert_header("x-ratelimit-remaining", "58")
                    .set_body_json(serde_json::json!({"name": "express", "platform": "NPM"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/npm/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"error": "Not Found"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let settings = RegistrySettings {
            upstream: HttpUpstreamConfig {
                base_url: format!("{}/api", mock_server.uri()),
                api_key: Some("e2e-key".to_string()),
                ..HttpUpstreamConfig::default()
            },
            ..RegistrySettings::default()
        };
        let coordinator = RequestCoordinator::from_settings(&settings).unwrap();

        let request = Request::get("npm/express").build();
        let fresh = coordinator.execute(&request).await;
        let cached = coordinator.execute(&request).await;

        assert!(fresh.is_success());
        assert_eq!(fresh.rate_limit().unwrap().remaining, 58);
        assert!(cached.is_cached());
        assert_eq!(cached.data().unwrap()["name"], "express");

        let missing = coordinator.execute(&Request::get("npm/missing").build()).await;
        assert_eq!(missing.error_kind(), Some(ErrorKind::PackageNotFoundError));
        assert!(missing.error().unwrap().message.contains("Not Found"));
    }
}
