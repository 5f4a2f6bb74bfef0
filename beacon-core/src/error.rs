//! Error types for beacon-core

use thiserror::Error;

/// Errors found while validating channel configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("URL for {0} has no host")]
    MissingHost(&'static str),

    #[error("Unsupported scheme '{scheme}' for {field}")]
    UnsupportedScheme { field: &'static str, scheme: String },

    #[error("Invalid reconnect policy: {0}")]
    InvalidPolicy(String),
}

/// Errors from the channel task itself
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel task failed: {0}")]
    TaskFailed(String),
}

/// Errors from decoding an inbound frame
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_missing_host_displays_correctly() {
        let error = ConfigError::MissingHost("production_base");
        assert!(error.to_string().contains("production_base"));
        assert!(error.to_string().contains("no host"));
    }

    #[test]
    fn config_error_invalid_url_keeps_source() {
        let source = url::Url::parse("not a url").unwrap_err();
        let error = ConfigError::InvalidUrl {
            field: "page_url",
            source,
        };
        assert!(error.to_string().starts_with("Invalid URL for page_url"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn config_error_unsupported_scheme_displays_correctly() {
        let error = ConfigError::UnsupportedScheme {
            field: "page_url",
            scheme: "ftp".to_string(),
        };
        assert!(error.to_string().contains("'ftp'"));
    }

    #[test]
    fn decode_error_invalid_json_displays_correctly() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = DecodeError::InvalidJson(source);
        assert!(error.to_string().contains("not valid JSON"));
    }

    #[test]
    fn channel_error_displays_correctly() {
        let error = ChannelError::TaskFailed("panicked".into());
        assert_eq!(error.to_string(), "Channel task failed: panicked");
    }
}
