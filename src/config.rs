//! Client configuration
//!
//! [`ClientConfig`] carries every option the executor recognizes. It can be
//! assembled with [`ClientConfig::builder`] or parsed from an in-memory JSON
//! or YAML document whose keys match the option names (`baseUrl`,
//! `maxRetries`, `rateLimit.windowMs`, ...). Durations are milliseconds.

use crate::error::{Error, Result};
use crate::http::RateLimiterConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Client Config
// ============================================================================

/// Configuration for [`crate::http::ApiClient`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Root used by the auth collaborator when building URLs
    pub base_url: String,

    /// Per-attempt abort deadline
    #[serde(with = "crate::serde_millis")]
    pub timeout: Duration,

    /// Number of additional attempts after the first
    pub max_retries: u32,

    /// Initial backoff delay
    #[serde(with = "crate::serde_millis")]
    pub retry_delay: Duration,

    /// Backoff growth factor per retry
    pub retry_multiplier: f64,

    /// Backoff ceiling
    #[serde(with = "crate::serde_millis")]
    pub max_retry_delay: Duration,

    /// Token bucket capacity and window
    pub rate_limit: RateLimiterConfig,

    /// Which events get traced
    pub logging: LoggingConfig,

    /// User agent sent by the default transport
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            retry_multiplier: 2.0,
            max_retry_delay: Duration::from_secs(32),
            rate_limit: RateLimiterConfig::default(),
            logging: LoggingConfig::default(),
            user_agent: format!("ratebound/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(format!("invalid JSON config: {e}")))
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::config(format!("invalid YAML config: {e}")))
    }

    /// Check the config for values the client cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::config("baseUrl must not be empty"));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::config(format!("invalid baseUrl '{}': {e}", self.base_url)))?;

        if self.timeout.is_zero() {
            return Err(Error::config("timeout must be greater than zero"));
        }
        if !self.retry_multiplier.is_finite() || self.retry_multiplier < 1.0 {
            return Err(Error::config(format!(
                "retryMultiplier must be >= 1.0, got {}",
                self.retry_multiplier
            )));
        }
        if self.max_retry_delay < self.retry_delay {
            return Err(Error::config(format!(
                "maxRetryDelay ({}ms) must not be below retryDelay ({}ms)",
                self.max_retry_delay.as_millis(),
                self.retry_delay.as_millis()
            )));
        }

        self.rate_limit.validate()
    }
}

/// Builder for client config
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, initial: Duration, multiplier: f64, max: Duration) -> Self {
        self.config.retry_delay = initial;
        self.config.retry_multiplier = multiplier;
        self.config.max_retry_delay = max;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = config;
        self
    }

    /// Set logging flags
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

// ============================================================================
// Logging Config
// ============================================================================

/// Toggles for request/response/retry/rate-limit tracing.
///
/// Purely observational: no flag changes client behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Master switch
    pub enabled: bool,
    pub requests: bool,
    pub responses: bool,
    pub retries: bool,
    pub rate_limit: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests: true,
            responses: true,
            retries: true,
            rate_limit: true,
        }
    }
}

impl LoggingConfig {
    /// Everything on
    pub fn verbose() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn log_requests(&self) -> bool {
        self.enabled && self.requests
    }

    pub fn log_responses(&self) -> bool {
        self.enabled && self.responses
    }

    pub fn log_retries(&self) -> bool {
        self.enabled && self.retries
    }

    pub fn log_rate_limit(&self) -> bool {
        self.enabled && self.rate_limit
    }
}
