//! Immutable client configuration.
//!
//! A [`ClientConfig`] is built once (explicitly or from `FIRSTSTREET_*`
//! environment variables) and shared by the dispatcher and executor. It owns
//! the API key, endpoint version and the default outbound headers.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.firststreet.org";
pub const DEFAULT_VERSION: &str = "v1";
pub const DEFAULT_CONNECTION_LIMIT: usize = 100;
pub const DEFAULT_USER_AGENT: &str = "rust/firststreet";
pub const ACCEPT_JSON_API: &str = "application/vnd.api+json";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_API_KEY: &str = "FIRSTSTREET_API_KEY";
pub const ENV_API_VERSION: &str = "FIRSTSTREET_API_VERSION";
pub const ENV_BASE_URL: &str = "FIRSTSTREET_BASE_URL";
pub const ENV_CONNECTION_LIMIT: &str = "FIRSTSTREET_CONNECTION_LIMIT";
pub const ENV_EXTRA_PARAM: &str = "FIRSTSTREET_EXTRA_PARAM";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "FIRSTSTREET_REQUEST_TIMEOUT_SECS";
pub const ENV_REQUESTS_PER_SECOND: &str = "FIRSTSTREET_REQUESTS_PER_SECOND";

/// API key wrapper that never prints its value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(Self(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for ApiKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    api_key: ApiKey,
    base_url: String,
    version: String,
    connection_limit: usize,
    extra_param: Option<String>,
    request_timeout: Duration,
    retry: RetryPolicy,
    user_agent: String,
    requests_per_second: Option<NonZeroU32>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: ApiKey::new(api_key)?,
            base_url: String::from(DEFAULT_BASE_URL),
            version: String::from(DEFAULT_VERSION),
            connection_limit: DEFAULT_CONNECTION_LIMIT,
            extra_param: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            user_agent: String::from(DEFAULT_USER_AGENT),
            requests_per_second: None,
        })
    }

    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY).ok_or(ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key)?;

        if let Some(version) = non_empty(lookup(ENV_API_VERSION)) {
            config = config.with_version(version);
        }
        if let Some(base_url) = non_empty(lookup(ENV_BASE_URL)) {
            config = config.with_base_url(base_url);
        }
        if let Some(raw) = non_empty(lookup(ENV_CONNECTION_LIMIT)) {
            let limit = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or(ConfigError::InvalidConnectionLimit { value: raw.clone() })?;
            config = config.with_connection_limit(limit)?;
        }
        if let Some(extra) = non_empty(lookup(ENV_EXTRA_PARAM)) {
            config = config.with_extra_param(extra);
        }
        if let Some(raw) = non_empty(lookup(ENV_REQUEST_TIMEOUT_SECS)) {
            let seconds = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
                .ok_or(ConfigError::InvalidTimeout { value: raw.clone() })?;
            config = config.with_request_timeout(Duration::from_secs_f64(seconds));
        }
        if let Some(raw) = non_empty(lookup(ENV_REQUESTS_PER_SECOND)) {
            let rate = raw
                .trim()
                .parse::<u32>()
                .ok()
                .and_then(NonZeroU32::new)
                .ok_or(ConfigError::InvalidRequestRate { value: raw.clone() })?;
            config = config.with_requests_per_second(rate);
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_connection_limit(mut self, limit: usize) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::InvalidConnectionLimit {
                value: limit.to_string(),
            });
        }
        self.connection_limit = limit;
        Ok(self)
    }

    pub fn with_extra_param(mut self, extra_param: impl Into<String>) -> Self {
        self.extra_param = Some(extra_param.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_requests_per_second(mut self, rate: NonZeroU32) -> Self {
        self.requests_per_second = Some(rate);
        self
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn connection_limit(&self) -> usize {
        self.connection_limit
    }

    pub fn extra_param(&self) -> Option<&str> {
        self.extra_param.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn requests_per_second(&self) -> Option<NonZeroU32> {
        self.requests_per_second
    }

    /// Headers sent with every request. Keys are lowercase.
    pub fn default_headers(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (String::from("content-encoding"), String::from("gzip")),
            (String::from("accept"), String::from(ACCEPT_JSON_API)),
            (
                String::from("authorization"),
                format!("Bearer {}", self.api_key.expose()),
            ),
            (String::from("user-agent"), self.user_agent.clone()),
        ])
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
