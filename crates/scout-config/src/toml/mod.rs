//! scout.toml parsing and the resolved configuration

use std::time::Duration;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use scout_core::error::ScoutError;
use crate::ConfigResult;

/// Production registry endpoint
pub const DEFAULT_BASE_URL: &str = "https://libraries.io/api";

/// Query parameter libraries.io reads the API key from
pub const DEFAULT_API_KEY_PARAM: &str = "api_key";

/// Fully resolved configuration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Registry API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub max_retry_after_secs: u64,
    pub rate_limit_requests: u32,
    pub rate_limit_window_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: usize,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_secs: u64,
    /// Share one upstream call between concurrent identical requests
    pub coalesce_inflight: bool,
    /// Also send the key as this query parameter; an empty value in a layer disables it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_query_param: Option<String>,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 60_000,
            max_retry_after_secs: 300,
            rate_limit_requests: 60,
            rate_limit_window_seconds: 60,
            cache_ttl_seconds: 300,
            cache_max_entries: 1000,
            pool_max_idle_per_host: 50,
            pool_idle_timeout_secs: 90,
            coalesce_inflight: true,
            api_key_query_param: Some(DEFAULT_API_KEY_PARAM.to_string()),
        }
    }
}

// The key never reaches logs through Debug.
impl std::fmt::Debug for ScoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoutConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("max_retry_after_secs", &self.max_retry_after_secs)
            .field("rate_limit_requests", &self.rate_limit_requests)
            .field("rate_limit_window_seconds", &self.rate_limit_window_seconds)
            .field("cache_ttl_seconds", &self.cache_ttl_seconds)
            .field("cache_max_entries", &self.cache_max_entries)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("pool_idle_timeout_secs", &self.pool_idle_timeout_secs)
            .field("coalesce_inflight", &self.coalesce_inflight)
            .field("api_key_query_param", &self.api_key_query_param)
            .finish()
    }
}

/// One configuration file; absent keys leave lower layers untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub retry_max_delay_ms: Option<u64>,
    pub max_retry_after_secs: Option<u64>,
    pub rate_limit_requests: Option<u32>,
    pub rate_limit_window_seconds: Option<u64>,
    pub cache_ttl_seconds: Option<u64>,
    pub cache_max_entries: Option<usize>,
    pub pool_max_idle_per_host: Option<usize>,
    pub pool_idle_timeout_secs: Option<u64>,
    pub coalesce_inflight: Option<bool>,
    pub api_key_query_param: Option<String>,
}

/// Empty means "header only"
pub(crate) fn query_param_setting(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

macro_rules! overlay {
    ($target:ident, $layer:ident, [$($field:ident),* $(,)?]) => {
        $(
            if let Some(value) = &$layer.$field {
                $target.$field = value.clone();
            }
        )*
    };
}

impl ScoutConfig {
    /// Apply every key present in `layer`
    pub fn overlay(&mut self, layer: &ConfigFile) {
        if let Some(key) = &layer.api_key {
            self.api_key = Some(key.clone());
        }
        if let Some(param) = &layer.api_key_query_param {
            self.api_key_query_param = query_param_setting(param);
        }
        overlay!(self, layer, [
            base_url,
            timeout_secs,
            max_retries,
            retry_base_delay_ms,
            retry_max_delay_ms,
            max_retry_after_secs,
            rate_limit_requests,
            rate_limit_window_seconds,
            cache_ttl_seconds,
            cache_max_entries,
            pool_max_idle_per_host,
            pool_idle_timeout_secs,
            coalesce_inflight,
        ]);
    }

    /// Reject values the access layer cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        match self.api_key.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(invalid(
                    "api_key",
                    "an API key is required (set SCOUT_API_KEY or api_key in scout.toml)",
                ))
            }
            Some(_) => {}
        }

        if self.rate_limit_requests == 0 {
            return Err(invalid("rate_limit_requests", "must be at least 1"));
        }
        if self.rate_limit_window_seconds == 0 {
            return Err(invalid("rate_limit_window_seconds", "must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "must be at least 1"));
        }
        if self.cache_max_entries == 0 {
            return Err(invalid("cache_max_entries", "must be at least 1"));
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            return Err(invalid(
                "retry_max_delay_ms",
                "must not be smaller than retry_base_delay_ms",
            ));
        }

        let url = url::Url::parse(&self.base_url)
            .map_err(|e| invalid("base_url", format!("'{}' is not a URL: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(
                "base_url",
                format!("scheme must be http or https, got '{}'", url.scheme()),
            ));
        }

        if let Some(param) = &self.api_key_query_param {
            if param.trim().is_empty() {
                return Err(invalid("api_key_query_param", "must not be empty when set"));
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }
}

pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> ScoutError {
    ScoutError::ConfigValidation {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Parse one configuration file's contents
pub fn parse_config_file(content: &str, file: &str) -> ConfigResult<ConfigFile> {
    toml::from_str(content).map_err(|e| {
        let (line, column) = e
            .span()
            .map(|span| line_column(content, span.start))
            .unwrap_or((0, 0));
        ScoutError::TomlParse {
            file: file.to_string(),
            message: e.message().to_string(),
            line,
            column,
        }
    })
}

/// Render a layer back to TOML
pub fn serialize_config_file(config: &ConfigFile) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| invalid("config", format!("TOML serialization error: {}", e)))
}

/// Load and parse a configuration file
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<ConfigFile> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ScoutError::io(format!("Failed to read {}", path), e))?;

    parse_config_file(&content, path.as_str())
}

/// 1-based line and column of a byte offset
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let prefix = content.get(..offset).unwrap_or(content);
    let line = prefix.matches('\n').count() + 1;
    let column = match prefix.rfind('\n') {
        Some(newline) => prefix[newline + 1..].chars().count() + 1,
        None => prefix.chars().count() + 1,
    };
    (line, column)
}
