//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, TimeZone, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get current Unix timestamp in UTC (milliseconds)
    fn now_utc_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc_millis(&self) -> i64 {
        get_utc_timestamp()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_utc_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// Get current Unix timestamp in UTC (milliseconds)
pub fn get_utc_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert Unix timestamp (milliseconds) to UTC RFC 3339 format
pub fn timestamp_to_rfc3339(timestamp_millis: i64) -> String {
    to_datetime(timestamp_millis).to_rfc3339()
}

/// Convert Unix timestamp (milliseconds) to a `YYYY-MM-DD` UTC calendar day
pub fn timestamp_to_day(timestamp_millis: i64) -> String {
    to_datetime(timestamp_millis).format("%Y-%m-%d").to_string()
}

fn to_datetime(timestamp_millis: i64) -> DateTime<Utc> {
    let seconds = timestamp_millis.div_euclid(1000);
    let nanos = (timestamp_millis.rem_euclid(1000) * 1_000_000) as u32;
    Utc.timestamp_opt(seconds, nanos)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_returns_non_zero_timestamp() {
        // given (precondition):
        let clock = SystemClock;

        // when (operation):
        let timestamp = clock.now_utc_millis();

        // then (expected result):
        assert!(timestamp > 0);
    }

    #[test]
    fn test_fixed_clock_returns_fixed_timestamp() {
        // given (precondition):
        let fixed_time = 1234567890123;
        let clock = FixedClock::new(fixed_time);

        // when (operation):
        let timestamp1 = clock.now_utc_millis();
        let timestamp2 = clock.now_utc_millis();

        // then (expected result):
        assert_eq!(timestamp1, fixed_time);
        assert_eq!(timestamp2, fixed_time);
    }

    #[test]
    fn test_timestamp_to_rfc3339_format() {
        // given (precondition):
        // 2023-01-01 00:00:00 UTC in milliseconds
        let timestamp = 1672531200000;

        // when (operation):
        let result = timestamp_to_rfc3339(timestamp);

        // then (expected result):
        assert!(result.starts_with("2023-01-01T00:00:00"));
        assert!(result.contains("+00:00"));
    }

    #[test]
    fn test_timestamp_to_day() {
        // given (precondition):
        let timestamp = 1672531200000; // 2023-01-01 UTC

        // when (operation):
        let result = timestamp_to_day(timestamp);

        // then (expected result):
        assert_eq!(result, "2023-01-01");
    }
}
