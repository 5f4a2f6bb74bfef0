//! Resolution of the notification socket URL.
//!
//! Development pages (loopback or private-network hosts) talk to the socket
//! served by the same host they were loaded from; every other page talks to the
//! configured production API. Either way the socket scheme follows the
//! security of the origin it was derived from.

use url::Url;

use crate::config::EndpointConfig;
use crate::error::ConfigError;

/// Hostnames that always count as development.
const DEV_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Private-network prefixes that count as development.
const DEV_PREFIXES: [&str; 3] = ["192.168.", "10.", "172."];

/// Scheme, authority and path prefix of an HTTP(S) or WS(S) origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    secure: bool,
    hostname: String,
    authority: String,
    prefix: String,
}

impl Origin {
    /// Parse an origin, accepting `http`, `https`, `ws` and `wss`.
    pub fn parse(field: &'static str, raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { field, source })?;
        Self::from_url(field, &url)
    }

    /// Build an origin from an already parsed URL.
    pub fn from_url(field: &'static str, url: &Url) -> Result<Self, ConfigError> {
        let secure = match url.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            other => {
                return Err(ConfigError::UnsupportedScheme {
                    field,
                    scheme: other.to_string(),
                });
            }
        };
        let hostname = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHost(field))?
            .to_string();
        let authority = match url.port() {
            Some(port) => format!("{}:{}", hostname, port),
            None => hostname.clone(),
        };
        let prefix = url.path().trim_end_matches('/').to_string();
        Ok(Self {
            secure,
            hostname,
            authority,
            prefix,
        })
    }

    /// Host name without port.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Whether the origin uses TLS.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Path of the URL without a trailing slash; empty for the root.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn socket_scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }
}

/// Returns true for loopback and private-network host names.
pub fn is_development_host(hostname: &str) -> bool {
    DEV_HOSTS.contains(&hostname) || DEV_PREFIXES.iter().any(|p| hostname.starts_with(p))
}

/// Derive the socket URL for a page served from `page`.
///
/// A development page uses its own host and ignores its path. Otherwise the
/// production base is used, and any path it carries prefixes `path`.
/// Infallible: both origins were validated when they were parsed.
pub fn resolve_endpoint(page: &Origin, production_base: &Origin, path: &str) -> String {
    let (origin, prefix) = if is_development_host(page.hostname()) {
        (page, "")
    } else {
        (production_base, production_base.prefix())
    };
    let path = path.trim_start_matches('/');
    format!(
        "{}://{}{}/{}",
        origin.socket_scheme(),
        origin.authority,
        prefix,
        path
    )
}

/// Validated endpoint settings, ready to produce socket URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResolver {
    page: Origin,
    production_base: Origin,
    path: String,
    token: Option<String>,
}

impl EndpointResolver {
    /// Validate endpoint configuration.
    pub fn from_config(config: &EndpointConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            page: Origin::parse("page_url", &config.page_url)?,
            production_base: Origin::parse("production_base", &config.production_base)?,
            path: config.path.clone(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// The socket URL, with the session token attached when one is configured.
    pub fn resolve(&self) -> String {
        let url = resolve_endpoint(&self.page, &self.production_base, &self.path);
        match &self.token {
            Some(token) => {
                let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
                let sep = if url.contains('?') { '&' } else { '?' };
                format!("{}{}token={}", url, sep, encoded)
            }
            None => url,
        }
    }

    /// The socket URL with any token redacted, for logging.
    pub fn redacted(&self) -> String {
        resolve_endpoint(&self.page, &self.production_base, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(raw: &str) -> Origin {
        Origin::parse("test", raw).unwrap()
    }

    const BASE: &str = "https://api.portal.example.com";
    const PATH: &str = "/ws/notifications/";

    #[test]
    fn localhost_over_https_uses_wss() {
        let url = resolve_endpoint(&origin("https://localhost:3000"), &origin(BASE), PATH);
        assert_eq!(url, "wss://localhost:3000/ws/notifications/");
    }

    #[test]
    fn localhost_over_http_uses_ws() {
        let url = resolve_endpoint(&origin("http://localhost:8000/app"), &origin(BASE), PATH);
        assert_eq!(url, "ws://localhost:8000/ws/notifications/");
    }

    #[test]
    fn private_network_hosts_are_development() {
        for host in ["127.0.0.1", "192.168.1.20", "10.0.0.4", "172.20.1.1"] {
            assert!(is_development_host(host), "{} should be development", host);
            let page = origin(&format!("http://{}", host));
            let url = resolve_endpoint(&page, &origin(BASE), PATH);
            assert_eq!(url, format!("ws://{}/ws/notifications/", host));
        }
    }

    #[test]
    fn public_host_uses_production_base() {
        let url = resolve_endpoint(&origin("http://portal.example.com"), &origin(BASE), PATH);
        assert_eq!(url, "wss://api.portal.example.com/ws/notifications/");
    }

    #[test]
    fn production_http_base_maps_to_ws() {
        let base = origin("http://staging.example.com:8080");
        let url = resolve_endpoint(&origin("https://hr.example.com"), &base, PATH);
        assert_eq!(url, "ws://staging.example.com:8080/ws/notifications/");
    }

    #[test]
    fn production_base_path_is_kept_as_prefix() {
        let base = origin("http://staging.example.com:8080/api/");
        let url = resolve_endpoint(&origin("https://hr.example.com"), &base, PATH);
        assert_eq!(url, "ws://staging.example.com:8080/api/ws/notifications/");

        let base = origin("https://example.com/portal/v2");
        let url = resolve_endpoint(&origin("https://hr.example.com"), &base, PATH);
        assert_eq!(url, "wss://example.com/portal/v2/ws/notifications/");
    }

    #[test]
    fn development_page_path_is_not_a_prefix() {
        let base = origin("https://example.com/portal");
        let url = resolve_endpoint(&origin("http://localhost:3000/dashboard/"), &base, PATH);
        assert_eq!(url, "ws://localhost:3000/ws/notifications/");
    }

    #[test]
    fn lookalike_hosts_are_not_development() {
        assert!(!is_development_host("localhost.example.com"));
        assert!(!is_development_host("110.1.2.3"));
        assert!(!is_development_host("portal.example.com"));
    }

    #[test]
    fn path_without_leading_slash_is_normalized() {
        let url = resolve_endpoint(&origin("http://localhost"), &origin(BASE), "ws/n/");
        assert_eq!(url, "ws://localhost/ws/n/");
    }

    #[test]
    fn origin_rejects_unsupported_scheme() {
        let err = Origin::parse("page_url", "ftp://localhost").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme { .. }));
    }

    #[test]
    fn origin_rejects_empty_host() {
        let err = Origin::parse("page_url", "http://").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { field: "page_url", .. }));
    }

    #[test]
    fn resolver_appends_encoded_token() {
        let config = EndpointConfig {
            page_url: "http://localhost:3000".into(),
            token: Some("a b&c".into()),
            ..Default::default()
        };
        let resolver = EndpointResolver::from_config(&config).unwrap();
        assert_eq!(
            resolver.resolve(),
            "ws://localhost:3000/ws/notifications/?token=a+b%26c"
        );
        assert_eq!(resolver.redacted(), "ws://localhost:3000/ws/notifications/");
    }

    #[test]
    fn resolver_ignores_empty_token() {
        let config = EndpointConfig {
            token: Some(String::new()),
            ..Default::default()
        };
        let resolver = EndpointResolver::from_config(&config).unwrap();
        assert!(!resolver.resolve().contains("token"));
    }
}
