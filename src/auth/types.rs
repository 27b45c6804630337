//! Auth configuration types
//!
//! Static credentials only. Obtaining, refreshing or storing them is the
//! caller's business.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Location for API key placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Place in HTTP header
    #[default]
    Header,
    /// Place in query parameter
    Query,
}

/// Authentication configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,

    /// API Key authentication (header or query)
    ApiKey {
        /// Where to place the API key
        #[serde(default)]
        location: Location,
        /// Header name (for header location)
        #[serde(default)]
        header_name: Option<String>,
        /// Query parameter name (for query location)
        #[serde(default)]
        query_param: Option<String>,
        /// Prefix to add before the value (e.g., "Bearer ")
        #[serde(default)]
        prefix: Option<String>,
        /// The API key value
        value: String,
    },

    /// HTTP Basic authentication
    Basic { username: String, password: String },

    /// Bearer token authentication
    Bearer { token: String },

    /// Custom headers
    CustomHeaders { headers: HashMap<String, String> },
}

impl AuthConfig {
    /// Header-located API key with an optional prefix
    pub fn api_key_header(
        header_name: impl Into<String>,
        prefix: Option<&str>,
        value: impl Into<String>,
    ) -> Self {
        Self::ApiKey {
            location: Location::Header,
            header_name: Some(header_name.into()),
            query_param: None,
            prefix: prefix.map(String::from),
            value: value.into(),
        }
    }

    /// Query-located API key
    pub fn api_key_query(param: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ApiKey {
            location: Location::Query,
            header_name: None,
            query_param: Some(param.into()),
            prefix: None,
            value: value.into(),
        }
    }

    /// Bearer token
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Short name of the auth scheme, safe to log
    pub fn scheme(&self) -> &'static str {
        match self {
            AuthConfig::None => "none",
            AuthConfig::ApiKey { .. } => "api_key",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::CustomHeaders { .. } => "custom_headers",
        }
    }
}
