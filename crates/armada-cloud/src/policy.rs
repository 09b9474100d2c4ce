//! Polling, retry and timeout policies shared by every resource kind

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff for long-running operation status checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay used when the server does not suggest one
    #[serde(with = "millis", rename = "initial_delay_ms")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    #[serde(with = "millis", rename = "max_delay_ms")]
    pub max_delay: Duration,

    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Delay before the given (zero-based) retry, seeded by a server hint
    pub fn delay_for_attempt(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = retry_after.unwrap_or(self.initial_delay);
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = base.as_secs_f64() * self.multiplier.powi(exponent);
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay)
    }
}

/// Settings for the eventual-consistency stability poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Consecutive observations of the target state required
    pub stable_count: u32,

    #[serde(with = "millis", rename = "poll_interval_ms")]
    pub poll_interval: Duration,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            stable_count: 5,
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// Per-operation deadlines for one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceTimeouts {
    #[serde(with = "millis", rename = "create_ms")]
    pub create: Duration,
    #[serde(with = "millis", rename = "read_ms")]
    pub read: Duration,
    #[serde(with = "millis", rename = "update_ms")]
    pub update: Duration,
    #[serde(with = "millis", rename = "delete_ms")]
    pub delete: Duration,
}

impl Default for ResourceTimeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(30 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(30 * 60),
        }
    }
}

/// Retry configuration for transport failures inside a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    #[serde(with = "millis", rename = "initial_delay_ms")]
    pub initial_delay: Duration,

    #[serde(with = "millis", rename = "max_delay_ms")]
    pub max_delay: Duration,

    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        BackoffConfig {
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.backoff_multiplier,
        }
        .delay_for_attempt(attempt, None)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_calculation() {
        let config = BackoffConfig {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10000),
            multiplier: 2.0,
        };

        assert_eq!(config.delay_for_attempt(0, None), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(1, None), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(2, None), Duration::from_millis(4000));
        assert_eq!(config.delay_for_attempt(3, None), Duration::from_millis(8000));
        assert_eq!(config.delay_for_attempt(4, None), Duration::from_millis(10000)); // capped at max
        assert_eq!(config.delay_for_attempt(u32::MAX, None), Duration::from_millis(10000));
    }

    #[test]
    fn test_delay_seeded_by_retry_after() {
        let config = BackoffConfig::default();
        let hint = Some(Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(0, hint), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(1, hint), Duration::from_secs(6));
        assert_eq!(config.delay_for_attempt(10, hint), config.max_delay);
    }

    #[test]
    fn test_timeouts_serde_in_millis() {
        let json = serde_json::to_value(ResourceTimeouts::default()).unwrap();
        assert_eq!(json["read_ms"], 300_000);

        let parsed: StabilityConfig =
            serde_json::from_str(r#"{"stable_count": 3, "poll_interval_ms": 250}"#).unwrap();
        assert_eq!(parsed.stable_count, 3);
        assert_eq!(parsed.poll_interval, Duration::from_millis(250));
    }
}
