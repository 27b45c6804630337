//! Authentication module
//!
//! Supports: API Key (header or query), Basic, Bearer, Custom Headers
//!
//! The executor only sees the [`Credentials`] trait; [`Authenticator`] is
//! the implementation for static credentials.

mod authenticator;
mod types;

pub use authenticator::{Authenticator, Credentials};
pub use types::{AuthConfig, Location};
