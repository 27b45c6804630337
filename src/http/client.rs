//! Resilient request executor
//!
//! [`ApiClient`] turns one logical `(method, path, options)` call into a
//! parsed body or exactly one typed [`Error`]. Every call:
//! - takes one token from the client's [`RateLimiter`] (retries do not)
//! - retries network failures, timeouts, 5xx and 408 with exponential backoff
//! - waits out 429s using `retry-after` without growing the backoff
//! - can be cancelled by id, all at once, or through a caller [`AbortSignal`]

use super::rate_limit::{RateLimiter, RateLimiterStats};
use super::registry::CancellationRegistry;
use super::response::interpret;
use super::signal::{AbortController, AbortReason, AbortSignal};
use super::transport::{ReqwestTransport, Transport, TransportRequest};
use crate::auth::{AuthConfig, Authenticator, Credentials};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::{validate_header, JsonValue, Method, RequestId, StringMap};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters, serialized in key order
    pub params: BTreeMap<String, String>,
    /// Extra headers; these override defaults and auth headers
    pub headers: StringMap,
    /// JSON body, ignored for GET
    pub body: Option<JsonValue>,
    /// Caller cancellation
    pub signal: Option<AbortSignal>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Abort the request when `signal` fires
    #[must_use]
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Rate-limited, retrying API client
pub struct ApiClient {
    config: ClientConfig,
    credentials: Arc<dyn Credentials>,
    transport: Arc<dyn Transport>,
    rate_limiter: RateLimiter,
    registry: CancellationRegistry,
}

impl ApiClient {
    /// Create a client over the default reqwest transport
    pub fn new(config: ClientConfig, credentials: impl Credentials + 'static) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.user_agent)?;
        Self::with_transport(config, credentials, Arc::new(transport))
    }

    /// Create a client with static credentials rooted at `config.base_url`
    pub fn with_auth(config: ClientConfig, auth: AuthConfig) -> Result<Self> {
        let authenticator = Authenticator::new(config.base_url.clone(), auth);
        Self::new(config, authenticator)
    }

    /// Create a client over a custom transport
    pub fn with_transport(
        config: ClientConfig,
        credentials: impl Credentials + 'static,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let rate_limiter = RateLimiter::new(&config.rate_limit);

        Ok(Self {
            config,
            credentials: Arc::new(credentials),
            transport,
            rate_limiter,
            registry: CancellationRegistry::default(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Make a GET request
    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<JsonValue> {
        self.request(Method::GET, path, options).await
    }

    /// Make a POST request
    pub async fn post(&self, path: &str, options: RequestOptions) -> Result<JsonValue> {
        self.request(Method::POST, path, options).await
    }

    /// Make a PUT request
    pub async fn put(&self, path: &str, options: RequestOptions) -> Result<JsonValue> {
        self.request(Method::PUT, path, options).await
    }

    /// Make a PATCH request
    pub async fn patch(&self, path: &str, options: RequestOptions) -> Result<JsonValue> {
        self.request(Method::PATCH, path, options).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<JsonValue> {
        self.request(Method::DELETE, path, options).await
    }

    /// Make a request and return the parsed body.
    ///
    /// The request is tracked under a fresh id from the moment it starts
    /// until it settles, so [`ApiClient::cancel_request`] reaches it while
    /// it waits for a token, while it is in flight and while it backs off.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<JsonValue> {
        let id = self.registry.next_id();
        let cancel = AbortController::new();
        let _registration = self.registry.register(id, cancel.clone());

        // Registry and caller aborts both count as cancellation; they come
        // first so they win over a timeout that fires at the same instant.
        let cancel_signal = match &options.signal {
            Some(caller) => cancel.signal().merge(caller),
            None => cancel.signal(),
        };

        if self.config.logging.log_rate_limit() && self.rate_limiter.is_throttling() {
            let stats = self.rate_limiter.stats();
            info!(
                request_id = id,
                queue_length = stats.queue_length,
                "waiting for rate limiter token"
            );
        }

        tokio::select! {
            biased;
            _ = cancel_signal.aborted() => return Err(cancelled(id)),
            acquired = self.rate_limiter.acquire() => acquired?,
        }

        let request = self.prepare(method, path, &options)?;
        let mut backoff = self.config.retry_delay;
        let mut attempt = 0;

        loop {
            let err = match self.attempt(id, attempt, &request, &cancel_signal, backoff).await {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.config.max_retries {
                if self.config.logging.log_responses() {
                    debug!(request_id = id, attempt, error = %err, "request failed");
                }
                return Err(err);
            }

            let delay = match &err {
                Error::RateLimited { retry_after, .. } => *retry_after,
                _ => backoff,
            };

            if self.config.logging.log_retries() {
                warn!(
                    request_id = id,
                    %method,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "{} failed ({}), attempt {}/{}, retrying",
                    path,
                    err,
                    attempt + 1,
                    self.config.max_retries + 1
                );
            }

            self.pause(id, delay, &cancel_signal).await?;

            if !matches!(err, Error::RateLimited { .. }) {
                backoff = self.next_backoff(backoff);
            }
            attempt += 1;
        }
    }

    /// Make a request and deserialize the parsed body
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let body = self.request(method, path, options).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Make a GET request and deserialize the parsed body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        self.request_json(Method::GET, path, options).await
    }

    /// Abort one in-flight request. Returns whether it was found.
    pub fn cancel_request(&self, id: RequestId) -> bool {
        self.registry.cancel(id)
    }

    /// Abort every in-flight request. Returns how many there were.
    pub fn cancel_all_requests(&self) -> usize {
        self.registry.cancel_all()
    }

    /// Ids of in-flight requests, ascending
    pub fn active_request_ids(&self) -> Vec<RequestId> {
        self.registry.ids()
    }

    /// Number of in-flight requests
    pub fn active_request_count(&self) -> usize {
        self.registry.len()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn rate_limiter_stats(&self) -> RateLimiterStats {
        self.rate_limiter.stats()
    }

    pub fn reset_rate_limiter(&self) {
        self.rate_limiter.reset();
    }

    pub fn is_throttling(&self) -> bool {
        self.rate_limiter.is_throttling()
    }

    pub fn time_until_refill(&self) -> Duration {
        self.rate_limiter.time_until_refill()
    }

    /// One send with its own timeout. The timeout timer is dropped on
    /// every exit.
    async fn attempt(
        &self,
        id: RequestId,
        attempt: u32,
        request: &TransportRequest,
        cancel_signal: &AbortSignal,
        backoff: Duration,
    ) -> Result<JsonValue> {
        let timeout = AbortController::new();
        let _timer = timeout.abort_after(self.config.timeout, AbortReason::Timeout);
        let signal = cancel_signal.merge(&timeout.signal());

        if self.config.logging.log_requests() {
            debug!(
                request_id = id,
                attempt,
                method = %request.method,
                url = %request.url,
                "sending request"
            );
        }

        let response = tokio::select! {
            biased;
            _ = signal.aborted() => {
                return Err(if cancel_signal.is_aborted() {
                    cancelled(id)
                } else {
                    Error::timeout(self.config.timeout)
                });
            }
            sent = self.transport.send(request.clone()) => sent?,
        };

        if self.config.logging.log_responses() {
            debug!(
                request_id = id,
                attempt,
                status = response.status,
                bytes = response.body.len(),
                "received response"
            );
        }

        interpret(response, backoff)
    }

    /// Sleep between attempts unless cancelled first
    async fn pause(
        &self,
        id: RequestId,
        delay: Duration,
        cancel_signal: &AbortSignal,
    ) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel_signal.aborted() => Err(cancelled(id)),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Build URL, headers and body once; every attempt sends the same request
    fn prepare(
        &self,
        method: Method,
        path: &str,
        options: &RequestOptions,
    ) -> Result<TransportRequest> {
        let url = self.credentials.build_authenticated_url(path)?;
        let url = append_query(&url, &options.params)?;

        let body = match &options.body {
            Some(body) if method.allows_body() => Some(Bytes::from(serde_json::to_vec(body)?)),
            _ => None,
        };

        let mut headers = StringMap::new();
        set_header(&mut headers, "Accept", "application/json");
        if body.is_some() {
            set_header(&mut headers, "Content-Type", "application/json");
        }
        for (key, value) in self.credentials.auth_headers()? {
            set_header(&mut headers, &key, &value);
        }
        for (key, value) in &options.headers {
            validate_header(key, value)?;
            set_header(&mut headers, key, value);
        }

        Ok(TransportRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Next exponential delay, capped at the configured ceiling
    fn next_backoff(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.config.retry_multiplier).round();
        let max_ms = self.config.max_retry_delay.as_millis() as f64;
        Duration::from_millis(next_ms.min(max_ms) as u64)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("rate_limiter", &self.rate_limiter)
            .field("active_requests", &self.registry.len())
            .finish_non_exhaustive()
    }
}

fn cancelled(id: RequestId) -> Error {
    Error::cancelled(format!("request {id} was cancelled"))
}

/// Insert or replace a header, matching existing names case-insensitively
fn set_header(headers: &mut StringMap, name: &str, value: &str) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.to_string());
}

fn append_query(url: &str, params: &BTreeMap<String, String>) -> Result<String> {
    if params.is_empty() {
        return Ok(url.to_string());
    }
    let mut parsed = url::Url::parse(url)
        .map_err(|e| Error::invalid_field("url", format!("invalid request URL '{url}': {e}")))?;
    parsed.query_pairs_mut().extend_pairs(params);
    Ok(parsed.into())
}
