use super::types::{
    RawBeaconConfig, RawEndpointConfig, RawKeepaliveConfig, RawReconnectConfig,
};
use anyhow::{Context, Result};
use beacon_core::{ChannelConfig, EndpointConfig, KeepaliveConfig, ReconnectPolicy};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<ChannelConfig> {
        let mut paths = Vec::new();
        if let Some(user_path) = Self::user_config_path() {
            paths.push(user_path);
        }
        paths.push(Self::project_config_path());
        Self::load_from_paths(&paths)
    }

    /// Load and merge the given files in order; missing files are skipped.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<ChannelConfig> {
        let mut raw = RawBeaconConfig::default();
        for path in paths {
            if let Some(layer) = Self::read_layer(path)? {
                raw = Self::merge_raw(raw, layer);
            }
        }
        let config = Self::finalize(raw);
        config
            .validate()
            .context("Invalid notification channel configuration")?;
        Ok(config)
    }

    /// Get user config path
    ///
    /// Returns `$XDG_CONFIG_HOME/beacon/config.toml` if set, otherwise
    /// `~/.config/beacon/config.toml`.
    pub fn user_config_path() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            Some(PathBuf::from(xdg_config).join("beacon/config.toml"))
        } else {
            dirs::home_dir().map(|home| home.join(".config/beacon/config.toml"))
        }
    }

    /// Get project config path
    /// Can be overridden with BEACON_PROJECT_CONFIG_DIR env var (useful for isolated e2e tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("BEACON_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".beacon/config.toml")
        }
    }

    fn read_layer(path: &Path) -> Result<Option<RawBeaconConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let layer = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(layer))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawBeaconConfig, overlay: RawBeaconConfig) -> RawBeaconConfig {
        RawBeaconConfig {
            auth_close_code: overlay.auth_close_code.or(base.auth_close_code),
            endpoint: RawEndpointConfig {
                page_url: overlay.endpoint.page_url.or(base.endpoint.page_url),
                production_base: overlay
                    .endpoint
                    .production_base
                    .or(base.endpoint.production_base),
                path: overlay.endpoint.path.or(base.endpoint.path),
                token: overlay.endpoint.token.or(base.endpoint.token),
            },
            reconnect: RawReconnectConfig {
                base_delay_ms: overlay
                    .reconnect
                    .base_delay_ms
                    .or(base.reconnect.base_delay_ms),
                max_delay_ms: overlay.reconnect.max_delay_ms.or(base.reconnect.max_delay_ms),
                max_retries: overlay.reconnect.max_retries.or(base.reconnect.max_retries),
            },
            keepalive: RawKeepaliveConfig {
                interval_ms: overlay.keepalive.interval_ms.or(base.keepalive.interval_ms),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawBeaconConfig) -> ChannelConfig {
        let defaults = ChannelConfig::default();
        let endpoint = EndpointConfig {
            page_url: raw.endpoint.page_url.unwrap_or(defaults.endpoint.page_url),
            production_base: raw
                .endpoint
                .production_base
                .unwrap_or(defaults.endpoint.production_base),
            path: raw.endpoint.path.unwrap_or(defaults.endpoint.path),
            token: raw.endpoint.token.filter(|t| !t.is_empty()),
        };
        let reconnect = ReconnectPolicy {
            base_delay: raw
                .reconnect
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect.base_delay),
            max_delay: raw
                .reconnect
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect.max_delay),
            max_retries: raw
                .reconnect
                .max_retries
                .unwrap_or(defaults.reconnect.max_retries),
        };
        let keepalive = KeepaliveConfig {
            interval: raw
                .keepalive
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.keepalive.interval),
        };
        ChannelConfig {
            auth_close_code: raw.auth_close_code.unwrap_or(defaults.auth_close_code),
            endpoint,
            reconnect,
            keepalive,
        }
    }
}
