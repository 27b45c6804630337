//! Authenticator implementation
//!
//! Builds authenticated URLs and headers from static credentials.

use super::types::{AuthConfig, Location};
use crate::error::{Error, Result};
use crate::types::{validate_header, StringMap};
use base64::Engine;
use std::collections::BTreeSet;
use std::sync::Arc;

/// What the executor needs from an auth provider
pub trait Credentials: Send + Sync {
    /// Full URL for `endpoint`, including any query-located credential
    fn build_authenticated_url(&self, endpoint: &str) -> Result<String>;

    /// Headers to send with every request
    fn auth_headers(&self) -> Result<StringMap>;
}

impl<T: Credentials + ?Sized> Credentials for Arc<T> {
    fn build_authenticated_url(&self, endpoint: &str) -> Result<String> {
        (**self).build_authenticated_url(endpoint)
    }

    fn auth_headers(&self) -> Result<StringMap> {
        (**self).auth_headers()
    }
}

/// Authenticator for static credentials rooted at a base URL
#[derive(Debug, Clone)]
pub struct Authenticator {
    base_url: String,
    config: AuthConfig,
    /// Scopes the credential was granted
    scopes: BTreeSet<String>,
}

impl Authenticator {
    /// Create a new authenticator with the given config
    pub fn new(base_url: impl Into<String>, config: AuthConfig) -> Self {
        Self {
            base_url: base_url.into(),
            config,
            scopes: BTreeSet::new(),
        }
    }

    /// Record the scopes this credential was granted
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Fail with [`Error::Scope`] unless every `required` scope was granted
    pub fn ensure_scopes(&self, required: &[&str]) -> Result<()> {
        let missing: Vec<String> = required
            .iter()
            .filter(|scope| !self.scopes.contains(**scope))
            .map(|scope| (*scope).to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::scope(missing))
        }
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(String::as_str)
    }

    /// Get the current auth config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join `endpoint` onto the base URL; absolute endpoints are used as is
    fn join(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        if self.base_url.is_empty() {
            return endpoint.to_string();
        }

        let base = self.base_url.trim_end_matches('/');
        let path = endpoint.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}

impl Credentials for Authenticator {
    fn build_authenticated_url(&self, endpoint: &str) -> Result<String> {
        let joined = self.join(endpoint);

        match &self.config {
            AuthConfig::ApiKey {
                location: Location::Query,
                query_param,
                prefix,
                value,
                ..
            } => {
                let mut url = url::Url::parse(&joined).map_err(|e| {
                    Error::invalid_field("url", format!("invalid request URL '{joined}': {e}"))
                })?;
                let param = query_param.as_deref().unwrap_or("api_key");
                let val = format!("{}{}", prefix.as_deref().unwrap_or(""), value);
                url.query_pairs_mut().append_pair(param, &val);
                Ok(url.into())
            }
            _ => Ok(joined),
        }
    }

    fn auth_headers(&self) -> Result<StringMap> {
        let mut headers = StringMap::new();

        match &self.config {
            AuthConfig::None => {}

            AuthConfig::ApiKey {
                location: Location::Header,
                header_name,
                prefix,
                value,
                ..
            } => {
                let header = header_name.as_deref().unwrap_or("Authorization");
                let val = format!("{}{}", prefix.as_deref().unwrap_or(""), value);
                headers.insert(header.to_string(), val);
            }

            AuthConfig::ApiKey { .. } => {}

            AuthConfig::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                headers.insert("Authorization".to_string(), format!("Basic {encoded}"));
            }

            AuthConfig::Bearer { token } => {
                headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            }

            AuthConfig::CustomHeaders { headers: custom } => {
                headers.extend(custom.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        for (name, value) in &headers {
            validate_header(name, value)?;
        }

        Ok(headers)
    }
}
