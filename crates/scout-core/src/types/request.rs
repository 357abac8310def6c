//! Request descriptions.
//!
//! A `Request` is immutable once built: the coordinator, the cache and the
//! transport all read the same value.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ScoutError, ScoutResult};
use crate::utils::hash::fingerprint;

/// HTTP method of an upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
        }
    }

    /// Whether repeating the call is free of side effects
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call against the upstream registry API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    method: Method,
    path: String,
    query: BTreeMap<String, String>,
    cacheable: bool,
    cache_key: String,
    retryable: bool,
}

impl Request {
    /// Start building a GET request for a path relative to the base URL
    pub fn get(path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Get, path)
    }

    /// Start building a request with an explicit method
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, path)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Reject requests that must never reach the network
    pub fn validate(&self) -> ScoutResult<()> {
        let path = self.path.trim();
        if path.is_empty() || path == "/" {
            return Err(ScoutError::validation("path", "must not be empty"));
        }
        if path.contains("://") {
            return Err(ScoutError::validation(
                "path",
                "must be relative to the configured base URL",
            ));
        }
        if path.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(ScoutError::validation("path", "must not contain '.' or '..' segments"));
        }
        if path.chars().any(char::is_control) {
            return Err(ScoutError::validation("path", "must not contain control characters"));
        }
        if let Some(key) = self.query.keys().find(|k| k.trim().is_empty()) {
            return Err(ScoutError::validation(
                "query",
                format!("parameter name '{}' is empty", key),
            ));
        }
        if self.cacheable && self.cache_key.is_empty() {
            return Err(ScoutError::validation("cache_key", "cacheable requests need a key"));
        }
        Ok(())
    }
}

/// Builder for `Request`
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    path: String,
    query: BTreeMap<String, String>,
    cacheable: Option<bool>,
    cache_key: Option<String>,
    retryable: Option<bool>,
}

impl RequestBuilder {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            cacheable: None,
            cache_key: None,
            retryable: None,
        }
    }

    /// Add a query parameter (later values replace earlier ones)
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(key.into(), value.to_string());
        self
    }

    /// Add a query parameter only when a value is present
    pub fn param_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = Some(cacheable);
        self
    }

    /// Override the fingerprint-derived cache key
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    /// Finish the request.
    ///
    /// Idempotent methods default to cacheable and retryable.
    pub fn build(self) -> Request {
        let idempotent = self.method.is_idempotent();
        let cache_key = self
            .cache_key
            .unwrap_or_else(|| fingerprint(self.method.as_str(), &self.path, &self.query));

        Request {
            method: self.method,
            path: self.path,
            query: self.query,
            cacheable: self.cacheable.unwrap_or(idempotent),
            cache_key,
            retryable: self.retryable.unwrap_or(idempotent),
        }
    }
}
