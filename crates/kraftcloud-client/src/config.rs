//! Connection configuration for the instances API.
//!
//! [`ProviderConfig`] is what an operator writes: every field optional, with
//! `KRAFTCLOUD_*` environment variables as fallback. Resolving it yields a
//! [`ClientConfig`] that is complete and validated.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Endpoint used when neither configuration nor environment set one.
pub const DEFAULT_ENDPOINT: &str = "https://api.kraft.cloud";

/// Environment variable overriding the default endpoint.
pub const ENV_ENDPOINT: &str = "KRAFTCLOUD_ENDPOINT";
/// Environment variable carrying the API user.
pub const ENV_USER: &str = "KRAFTCLOUD_USER";
/// Environment variable carrying the API token.
pub const ENV_TOKEN: &str = "KRAFTCLOUD_TOKEN";

/// Errors raised while resolving the connection configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No token was configured or found in the environment.
    #[error("missing API token: set `token` in the configuration or the KRAFTCLOUD_TOKEN environment variable")]
    MissingToken,

    /// The endpoint is not an HTTP(S) URL.
    #[error("invalid endpoint {0:?}: value must be a HTTP(S) URL")]
    InvalidEndpoint(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// User-facing provider configuration.
#[derive(Clone, Default, Deserialize)]
pub struct ProviderConfig {
    /// API endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// API user, for accounts that authenticate with user and token.
    #[serde(default)]
    pub user: Option<String>,
    /// API token.
    #[serde(default)]
    pub token: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve against the process environment.
    ///
    /// # Errors
    ///
    /// See [`ProviderConfig::resolve_with`].
    pub fn resolve(&self) -> Result<ClientConfig, ConfigError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` to read environment values.
    ///
    /// Environment values are considered first and explicit configuration
    /// values override them. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingToken` if no token is available and
    /// `ConfigError::InvalidEndpoint` if the endpoint is not an HTTP(S) URL.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<ClientConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: &Option<String>, key: &str| {
            explicit
                .clone()
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(key).filter(|v| !v.is_empty()))
        };

        let endpoint =
            pick(&self.endpoint, ENV_ENDPOINT).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        validate_http_url(&endpoint)?;

        let user = pick(&self.user, ENV_USER);
        let token = pick(&self.token, ENV_TOKEN).ok_or(ConfigError::MissingToken)?;

        Ok(ClientConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            user,
            token,
            request_timeout_seconds: ClientConfig::default_request_timeout(),
            connect_timeout_seconds: ClientConfig::default_connect_timeout(),
        })
    }
}

/// Validate that `value` is an absolute `http` or `https` URL.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEndpoint` otherwise.
pub fn validate_http_url(value: &str) -> Result<(), ConfigError> {
    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::InvalidEndpoint(value.to_string())),
    }
}

/// Resolved configuration for [`HttpInstanceClient`](crate::HttpInstanceClient).
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL without trailing slash.
    pub endpoint: String,
    /// API user; switches authentication from bearer to basic.
    #[serde(default)]
    pub user: Option<String>,
    /// API token.
    pub token: String,
    /// Whole-request timeout in seconds.
    #[serde(default = "ClientConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Connect timeout in seconds.
    #[serde(default = "ClientConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .finish()
    }
}

impl ClientConfig {
    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    /// Create a configuration for `endpoint` authenticated with a bearer token.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            user: None,
            token: token.into(),
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
        }
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn environment_supplies_missing_values() {
        let config = ProviderConfig::default()
            .resolve_with(env(&[(ENV_TOKEN, "secret"), (ENV_USER, "alice")]))
            .unwrap();

        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.token, "secret");
        assert_eq!(config.user.as_deref(), Some("alice"));
    }

    #[test]
    fn explicit_values_override_environment() {
        let provider = ProviderConfig {
            endpoint: Some("http://localhost:9000/".to_string()),
            user: None,
            token: Some("explicit".to_string()),
        };
        let config = provider
            .resolve_with(env(&[
                (ENV_ENDPOINT, "https://fra0.kraft.cloud"),
                (ENV_TOKEN, "from-env"),
            ]))
            .unwrap();

        assert_eq!(config.endpoint, "http://localhost:9000");
        assert_eq!(config.token, "explicit");
    }

    #[test]
    fn empty_values_count_as_unset() {
        let provider = ProviderConfig {
            endpoint: Some(String::new()),
            user: None,
            token: None,
        };
        let config = provider
            .resolve_with(env(&[(ENV_ENDPOINT, ""), (ENV_TOKEN, "t")]))
            .unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn missing_token_is_an_error() {
        let result = ProviderConfig::default().resolve_with(env(&[]));
        assert!(matches!(result, Err(ConfigError::MissingToken)));
    }

    #[test]
    fn endpoint_must_be_http_url() {
        for bad in ["ftp://example.com", "not a url", "example.com"] {
            let provider = ProviderConfig {
                endpoint: Some(bad.to_string()),
                user: None,
                token: Some("t".to_string()),
            };
            assert!(
                matches!(
                    provider.resolve_with(env(&[])),
                    Err(ConfigError::InvalidEndpoint(_))
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn debug_redacts_token() {
        let config = ClientConfig::new("https://api.kraft.cloud", "super-secret");
        let printed = format!("{config:?}");
        assert!(!printed.contains("super-secret"));

        let provider = ProviderConfig {
            token: Some("super-secret".to_string()),
            ..ProviderConfig::default()
        };
        assert!(!format!("{provider:?}").contains("super-secret"));
    }

    #[test]
    fn timeout_durations() {
        let config = ClientConfig::new("https://api.kraft.cloud", "t");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }
}
