//! Client configuration
//!
//! [`ClientConfig`] gathers everything needed to build a [`Client`]. It can be
//! deserialized from any serde source, or read from the environment:
//!
//! | variable | default |
//! |---|---|
//! | `MESSENGER_PAGE_TOKEN` | required |
//! | `MESSENGER_API_VERSION` | `3.2` |
//! | `MESSENGER_TIMEOUT_SECS` | `5` |
//! | `MESSENGER_GRAPH_URL` | `https://graph.facebook.com` |

use std::{fmt, time::Duration};

use serde::Deserialize;

use crate::{
    client::{Client, ClientBuilder, DEFAULT_API_VERSION, DEFAULT_GRAPH_URL, DEFAULT_TIMEOUT},
    error::Error,
};

const PAGE_TOKEN_VAR: &str = "MESSENGER_PAGE_TOKEN";
const API_VERSION_VAR: &str = "MESSENGER_API_VERSION";
const TIMEOUT_VAR: &str = "MESSENGER_TIMEOUT_SECS";
const GRAPH_URL_VAR: &str = "MESSENGER_GRAPH_URL";

#[derive(Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ClientConfig {
    pub page_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
}

impl ClientConfig {
    /// A configuration with defaults for everything but the page token.
    pub fn new(page_token: impl Into<String>) -> Self {
        Self {
            page_token: page_token.into(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            graph_url: default_graph_url(),
        }
    }

    /// Reads the configuration from `MESSENGER_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let page_token = lookup(PAGE_TOKEN_VAR)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::internal(format!("{PAGE_TOKEN_VAR} is not set").into()))?;

        let mut config = Self::new(page_token);

        if let Some(version) = lookup(API_VERSION_VAR) {
            config.api_version = version;
        }

        if let Some(timeout) = lookup(TIMEOUT_VAR) {
            config.timeout_secs = timeout.trim().parse().map_err(|err| {
                Error::internal(format!("{TIMEOUT_VAR} must be a whole number of seconds: {err}").into())
            })?;
        }

        if let Some(url) = lookup(GRAPH_URL_VAR) {
            config.graph_url = url;
        }

        Ok(config)
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds a [`Client`] from this configuration.
    pub fn into_client(self) -> Result<Client, Error> {
        let builder = ClientBuilder::from_config(&self);
        builder.build(self.page_token)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("page_token", &"REDACTED")
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .field("graph_url", &self.graph_url)
            .finish()
    }
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_owned()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_graph_url() -> String {
    DEFAULT_GRAPH_URL.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = ClientConfig::from_lookup(lookup(&[(PAGE_TOKEN_VAR, "tok")])).unwrap();
        assert_eq!(config, ClientConfig::new("tok"));
        assert_eq!(config.api_version, "3.2");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.graph_url, "https://graph.facebook.com");
    }

    #[test]
    fn overrides_apply() {
        let config = ClientConfig::from_lookup(lookup(&[
            (PAGE_TOKEN_VAR, "tok"),
            (API_VERSION_VAR, "v19.0"),
            (TIMEOUT_VAR, " 12 "),
            (GRAPH_URL_VAR, "http://localhost:9000"),
        ]))
        .unwrap();

        assert_eq!(config.api_version, "v19.0");
        assert_eq!(config.timeout_secs, 12);
        assert_eq!(config.graph_url, "http://localhost:9000");
    }

    #[test]
    fn token_is_required() {
        assert!(ClientConfig::from_lookup(lookup(&[])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[(PAGE_TOKEN_VAR, "")])).is_err());
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let result =
            ClientConfig::from_lookup(lookup(&[(PAGE_TOKEN_VAR, "t"), (TIMEOUT_VAR, "soon")]));
        assert!(matches!(result, Err(Error::Internal(_))));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ClientConfig =
            serde_json::from_value(serde_json::json!({"page_token": "tok", "timeout_secs": 9}))
                .unwrap();
        assert_eq!(config.timeout_secs, 9);
        assert_eq!(config.api_version, "3.2");
    }

    #[test]
    fn debug_hides_the_token() {
        let printed = format!("{:?}", ClientConfig::new("super-secret"));
        assert!(!printed.contains("super-secret"));
    }
}
