//! Configuration for the notification channel

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::ReconnectPolicy;
use crate::endpoint::EndpointResolver;
use crate::error::ConfigError;

/// Default page location used when none is configured.
pub const DEFAULT_PAGE_URL: &str = "http://localhost:3000";

/// Default production API base.
pub const DEFAULT_PRODUCTION_BASE: &str = "https://portal.example.com";

/// Path of the notification socket on both development and production hosts.
pub const DEFAULT_SOCKET_PATH: &str = "/ws/notifications/";

/// Close code the server uses when the subscriber's credentials are invalid.
pub const DEFAULT_AUTH_CLOSE_CODE: u16 = 4001;

/// Default cadence of the keepalive probe.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Complete configuration for one notification channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Close code meaning "not authenticated"; never retried
    #[serde(default = "default_auth_close_code")]
    pub auth_close_code: u16,

    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    #[serde(default)]
    pub keepalive: KeepaliveConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            auth_close_code: DEFAULT_AUTH_CLOSE_CODE,
            endpoint: EndpointConfig::default(),
            reconnect: ReconnectPolicy::default(),
            keepalive: KeepaliveConfig::default(),
        }
    }
}

impl ChannelConfig {
    /// Check every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        EndpointResolver::from_config(&self.endpoint)?;
        self.reconnect.validate()?;
        if self.keepalive.interval.is_zero() {
            return Err(ConfigError::InvalidPolicy(
                "keepalive interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Where the notification socket lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Location of the page hosting the subscriber (scheme and host matter)
    #[serde(default = "default_page_url")]
    pub page_url: String,

    /// Base URL of the deployed API
    #[serde(default = "default_production_base")]
    pub production_base: String,

    /// Socket path appended to whichever host is chosen
    #[serde(default = "default_socket_path")]
    pub path: String,

    /// Session token passed as the `token` query parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            production_base: default_production_base(),
            path: default_socket_path(),
            token: None,
        }
    }
}

/// Keepalive probe settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    #[serde(rename = "interval_ms", with = "millis", default = "default_keepalive")]
    pub interval: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

fn default_page_url() -> String {
    DEFAULT_PAGE_URL.to_string()
}

fn default_production_base() -> String {
    DEFAULT_PRODUCTION_BASE.to_string()
}

fn default_socket_path() -> String {
    DEFAULT_SOCKET_PATH.to_string()
}

fn default_auth_close_code() -> u16 {
    DEFAULT_AUTH_CLOSE_CODE
}

fn default_keepalive() -> Duration {
    DEFAULT_KEEPALIVE_INTERVAL
}

/// Serialize a [`Duration`] as whole milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
