//! Exponential backoff policy for reconnecting the notification channel.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::millis;
use crate::error::ConfigError;

/// Default delay before the first reconnect attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(3000);

/// Default ceiling for any single reconnect delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Default number of reconnect attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Exponential backoff configuration for reconnection.
///
/// The policy is a pure value: it computes delays and answers whether another
/// retry is allowed, but the retry counter itself lives on the
/// [`ConnectionSession`](crate::session::ConnectionSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    #[serde(rename = "base_delay_ms", with = "millis", default = "default_base")]
    pub base_delay: Duration,
    /// Maximum delay between attempts.
    #[serde(rename = "max_delay_ms", with = "millis", default = "default_max")]
    pub max_delay: Duration,
    /// Number of reconnect attempts allowed without a successful open.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base() -> Duration {
    DEFAULT_BASE_DELAY
}

fn default_max() -> Duration {
    DEFAULT_MAX_DELAY
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ReconnectPolicy {
    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// `min(base * 2^attempt, max)`, saturating instead of overflowing.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
    }

    /// Whether a reconnect is allowed after `retry_count` retries already spent.
    pub fn allows_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    /// Reject policies that could never produce a sensible schedule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_delay.is_zero() {
            return Err(ConfigError::InvalidPolicy(
                "base delay must be greater than zero".into(),
            ));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::InvalidPolicy(format!(
                "max delay {:?} is shorter than base delay {:?}",
                self.max_delay, self.base_delay
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_policy_default_values() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_secs(3));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.max_retries, 5);
    }

    #[test]
    fn reconnect_policy_delay_doubles_until_capped() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u128> = (0..7)
            .map(|n| policy.delay_for_attempt(n).as_millis())
            .collect();
        assert_eq!(delays, vec![3000, 6000, 12000, 24000, 30000, 30000, 30000]);
    }

    #[test]
    fn reconnect_policy_never_overflows() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(63), DEFAULT_MAX_DELAY);
        assert_eq!(policy.delay_for_attempt(64), DEFAULT_MAX_DELAY);
        assert_eq!(policy.delay_for_attempt(u32::MAX), DEFAULT_MAX_DELAY);
    }

    #[test]
    fn reconnect_policy_allows_exactly_max_retries() {
        let policy = ReconnectPolicy::default();
        let allowed = (0..10).filter(|n| policy.allows_retry(*n)).count();
        assert_eq!(allowed, 5);
        assert!(!policy.allows_retry(5));
    }

    #[test]
    fn reconnect_policy_rejects_zero_base() {
        let policy = ReconnectPolicy {
            base_delay: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn reconnect_policy_rejects_cap_below_base() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(5),
            max_retries: 3,
        };
        assert!(policy.validate().is_err());
        assert!(ReconnectPolicy::default().validate().is_ok());
    }

    #[test]
    fn reconnect_policy_deserializes_milliseconds() {
        let toml = r#"
            base_delay_ms = 500
            max_delay_ms = 4000
        "#;
        let policy: ReconnectPolicy = toml::from_str(toml).unwrap();
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(4));
        assert_eq!(policy.max_retries, DEFAULT_MAX_RETRIES);
    }
}
