use serde::Deserialize;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct RawBeaconConfig {
    /// Close code the server sends for rejected credentials
    pub auth_close_code: Option<u16>,

    #[serde(default)]
    pub endpoint: RawEndpointConfig,

    #[serde(default)]
    pub reconnect: RawReconnectConfig,

    #[serde(default)]
    pub keepalive: RawKeepaliveConfig,
}

/// Endpoint section as stored in TOML
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct RawEndpointConfig {
    /// Page location the subscriber pretends to run on
    pub page_url: Option<String>,

    /// Production API base
    pub production_base: Option<String>,

    /// Socket path
    pub path: Option<String>,

    /// Session credential
    pub token: Option<String>,
}

/// Reconnect section as stored in TOML
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct RawReconnectConfig {
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Keepalive section as stored in TOML
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct RawKeepaliveConfig {
    pub interval_ms: Option<u64>,
}
