// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # ratebound
//!
//! A resilient HTTP client core for rate-limited, occasionally unreliable
//! REST APIs.
//!
//! ## Features
//!
//! - **Token Bucket Limiter**: continuous refill, FIFO waiters, stats, reset
//! - **Retries**: exponential backoff for 5xx, 408, timeouts and network errors
//! - **429 Handling**: honors `retry-after` (seconds or HTTP date)
//! - **Cancellation**: by request id, all at once, or a caller signal
//! - **Typed Errors**: one closed error enum with retry classification
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ratebound::{ApiClient, AuthConfig, ClientConfig, RequestOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::builder()
//!         .base_url("https://api.example.com/v1")
//!         .build();
//!     let client = ApiClient::with_auth(config, AuthConfig::bearer("token"))?;
//!
//!     let games = client
//!         .get("/games", RequestOptions::new().param("page", "1"))
//!         .await?;
//!     println!("{games}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          ApiClient                            │
//! │  request(method, path, options) → parsed body | Error         │
//! └───────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────┬────────────────┼───────────────┬───────────────┐
//! │ RateLimiter │ Registry       │ Signals       │ Transport     │
//! ├─────────────┼────────────────┼───────────────┼───────────────┤
//! │ Token bucket│ id → abort     │ Merge         │ reqwest       │
//! │ FIFO queue  │ cancel one/all │ Timeout       │ (pluggable)   │
//! └─────────────┴────────────────┴───────────────┴───────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Static credentials and the credentials seam
pub mod auth;

/// Rate-limited, retrying HTTP client
pub mod http;

/// Client configuration
pub mod config;

/// Tracing subscriber setup
pub mod logging;

mod serde_millis;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, ErrorKind, Result};
pub use types::*;

// Re-export commonly used types
pub use auth::{AuthConfig, Authenticator, Credentials, Location};
pub use config::{ClientConfig, LoggingConfig};
pub use http::{
    AbortController, AbortReason, AbortSignal, ApiClient, RateLimiter, RateLimiterConfig,
    RateLimiterStats, RequestOptions, Transport, TransportRequest, TransportResponse,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
