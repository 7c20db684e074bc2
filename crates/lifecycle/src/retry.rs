//! Declarative retry policies for activity calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff policy attached to one activity call.
///
/// The delay after failed attempt `n` (1-based) is
/// `min(initial_interval * backoff_coefficient^(n-1), maximum_interval)`.
/// A `maximum_attempts` of 0 means unlimited attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(rename = "initial_interval_ms", with = "millis")]
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    #[serde(rename = "maximum_interval_ms", with = "millis")]
    pub maximum_interval: Duration,
    pub maximum_attempts: u32,
}

impl RetryPolicy {
    /// Policy for order validation: 1s initial, x2, capped at 30s, 5 attempts.
    pub fn validation() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(30),
            maximum_attempts: 5,
        }
    }

    /// Policy for order processing: 1s initial, x2, capped at 1 minute, 4 attempts.
    pub fn processing() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(60),
            maximum_attempts: 4,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            maximum_attempts: 1,
            ..Self::validation()
        }
    }

    /// Returns true if attempt number `attempt` (1-based) may run.
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        self.maximum_attempts == 0 || attempt <= self.maximum_attempts
    }

    /// Returns how long to wait after failed attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);

        if !secs.is_finite() || secs >= self.maximum_interval.as_secs_f64() {
            self.maximum_interval
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_delays_double_until_cap() {
        let policy = RetryPolicy::validation();
        let delays: Vec<u64> = (1..=7)
            .map(|n| policy.delay_for_attempt(n).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_processing_cap_is_one_minute() {
        let policy = RetryPolicy::processing();
        assert_eq!(policy.delay_for_attempt(6), Duration::from_secs(32));
        assert_eq!(policy.delay_for_attempt(7), Duration::from_secs(60));
        assert_eq!(policy.delay_for_attempt(500), Duration::from_secs(60));
    }

    #[test]
    fn test_attempt_limits() {
        let policy = RetryPolicy::validation();
        assert!(policy.allows_attempt(5));
        assert!(!policy.allows_attempt(6));

        let unlimited = RetryPolicy {
            maximum_attempts: 0,
            ..RetryPolicy::processing()
        };
        assert!(unlimited.allows_attempt(10_000));

        assert!(!RetryPolicy::no_retry().allows_attempt(2));
    }

    #[test]
    fn test_serialization_uses_milliseconds() {
        let json = serde_json::to_value(RetryPolicy::processing()).unwrap();
        assert_eq!(json["initial_interval_ms"], 1000);
        assert_eq!(json["maximum_interval_ms"], 60_000);
        assert_eq!(json["maximum_attempts"], 4);

        let back: RetryPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, RetryPolicy::processing());
    }
}
