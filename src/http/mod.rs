//! HTTP client module
//!
//! Provides the rate-limited, retrying API client and its parts.
//!
//! # Features
//!
//! - **Rate Limiting**: token bucket with continuous refill and FIFO waiters
//! - **Automatic Retries**: exponential backoff, `retry-after` for 429s
//! - **Cancellation**: per request, all at once, or via a caller signal
//! - **Pluggable Transport**: reqwest by default, anything via [`Transport`]

mod client;
mod rate_limit;
mod registry;
mod response;
mod signal;
mod transport;

pub use client::{ApiClient, RequestOptions};
pub use rate_limit::{RateLimiter, RateLimiterConfig, RateLimiterStats};
pub use response::{error_message, is_json_content_type, parse_body, parse_retry_after};
pub use signal::{AbortController, AbortReason, AbortSignal, TimerGuard};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
