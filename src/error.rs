//! Error types for ratebound
//!
//! A closed taxonomy: every failure that leaves the client is exactly one
//! variant of [`Error`]. Retry decisions are made from the variant and its
//! status code alone via [`Error::is_retryable`].

use crate::types::JsonValue;
use std::time::Duration;
use thiserror::Error;

/// Boxed error used to retain the original cause of a transport failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for ratebound
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Remote API Errors
    // ============================================================================
    /// Non-success status, or an in-band error payload on a success status
    #[error("HTTP {status}: {message}")]
    Api {
        status: u16,
        message: String,
        body: JsonValue,
    },

    /// 401/403-class failure
    #[error("Authentication failed (HTTP {status}): {message}")]
    Auth {
        status: u16,
        message: String,
        body: JsonValue,
    },

    #[error("Rate limited, retry after {}ms", retry_after.as_millis())]
    RateLimited {
        retry_after: Duration,
        body: JsonValue,
    },

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Request cancelled: {message}")]
    Cancelled { message: String },

    // ============================================================================
    // Higher-Layer Errors
    // ============================================================================
    #[error("Insufficient scope: {message}")]
    Scope {
        message: String,
        missing: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Raised while building a client, never from the request path
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Discriminant of [`Error`], with API errors split into client and server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ApiClient,
    ApiServer,
    Auth,
    RateLimit,
    Network,
    Timeout,
    Cancelled,
    Scope,
    Validation,
    Config,
}

impl Error {
    /// Build the error for a non-429 failed response.
    ///
    /// 401 and 403 become [`Error::Auth`], everything else [`Error::Api`].
    pub fn from_status(status: u16, message: impl Into<String>, body: JsonValue) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Auth {
                status,
                message,
                body,
            },
            _ => Self::Api {
                status,
                message,
                body,
            },
        }
    }

    /// Create an API error
    pub fn api(status: u16, message: impl Into<String>, body: JsonValue) -> Self {
        Self::Api {
            status,
            message: message.into(),
            body,
        }
    }

    /// Create a rate limit error
    pub fn rate_limited(retry_after: Duration, body: JsonValue) -> Self {
        Self::RateLimited { retry_after, body }
    }

    /// Create a network error wrapping its cause
    pub fn network(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Network {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Create a cancellation error
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Create a scope error listing the missing scopes
    pub fn scope(missing: Vec<String>) -> Self {
        Self::Scope {
            message: format!("missing required scopes: {}", missing.join(", ")),
            missing,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error tied to a named field
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The discriminant of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Api { status, .. } if *status >= 500 => ErrorKind::ApiServer,
            Error::Api { .. } => ErrorKind::ApiClient,
            Error::Auth { .. } => ErrorKind::Auth,
            Error::RateLimited { .. } => ErrorKind::RateLimit,
            Error::Network { .. } => ErrorKind::Network,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::Scope { .. } => ErrorKind::Scope,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Config { .. } => ErrorKind::Config,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network { .. } | Error::Timeout { .. } | Error::RateLimited { .. } => true,
            Error::Api { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// HTTP status for API-originated errors
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } | Error::Auth { status, .. } => Some(*status),
            Error::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Parsed response body for API-originated errors
    pub fn body(&self) -> Option<&JsonValue> {
        match self {
            Error::Api { body, .. } | Error::Auth { body, .. } | Error::RateLimited { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }

    /// `true` for 5xx API errors
    pub fn is_server_error(&self) -> bool {
        self.kind() == ErrorKind::ApiServer
    }

    /// `true` for 4xx API errors, including auth failures but not 429
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::ApiClient | ErrorKind::Auth)
    }

    /// `true` if the request was cancelled rather than failed
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Short human-readable message for presentation layers.
    pub fn user_message(&self) -> String {
        match self {
            Error::RateLimited { retry_after, .. } => {
                let secs = retry_after.as_millis().div_ceil(1000).max(1);
                format!("Too many requests. Please wait {secs} seconds before trying again.")
            }
            Error::Auth { .. } => {
                "Authentication failed. Please check your credentials.".to_string()
            }
            Error::Timeout { .. } => {
                "The request timed out. Please check your connection and try again.".to_string()
            }
            Error::Network { .. } => {
                "Unable to reach the server. Please check your connection.".to_string()
            }
            Error::Cancelled { .. } => "The request was cancelled.".to_string(),
            Error::Api { status, .. } if *status >= 500 => {
                "The server encountered an error. Please try again later.".to_string()
            }
            Error::Api { message, .. } => format!("Request failed: {message}"),
            Error::Scope { missing, .. } => {
                format!("Missing required permissions: {}.", missing.join(", "))
            }
            Error::Validation { message, .. } => format!("Invalid input: {message}"),
            Error::Config { message } => format!("Configuration problem: {message}"),
        }
    }
}

/// Server errors and 408 are worth another attempt; other statuses are not
fn is_retryable_status(status: u16) -> bool {
    status == 408 || (500..=599).contains(&status)
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::validation(format!("invalid request: {err}"));
        }
        let message = if err.is_connect() {
            "connection failed".to_string()
        } else if err.is_body() || err.is_decode() {
            "failed to read response body".to_string()
        } else {
            err.to_string()
        };
        Self::network(message, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("JSON error: {err}"))
    }
}

/// Result type alias for ratebound
pub type Result<T> = std::result::Result<T, Error>;
