//! Queue configuration types

use crate::error::{QueueError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Construction options for [`TaskQueue`](crate::TaskQueue)
///
/// `concurrency` and `interval_cap` use `usize::MAX` as "unbounded"; an
/// `interval` of zero disables rate limiting entirely. Validation runs at
/// construction, and again on the runtime setters for `concurrency` and the
/// default timeout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    /// Maximum tasks running simultaneously (`usize::MAX` = unbounded)
    pub concurrency: usize,
    /// Begin running; when false the queue starts paused
    pub auto_start: bool,
    /// Maximum admissions per interval (`usize::MAX` = unbounded)
    pub interval_cap: usize,
    /// Interval length; zero disables rate limiting
    pub interval: Duration,
    /// At a window boundary, begin the next window with the admission count
    /// set to the number of still-running tasks instead of zero
    pub carryover_interval_count: bool,
    /// Enforce the cap over every rolling interval instead of fixed windows
    pub strict: bool,
    /// Default per-task timeout, applied at submission time
    pub timeout: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: usize::MAX,
            auto_start: true,
            interval_cap: usize::MAX,
            interval: Duration::ZERO,
            carryover_interval_count: false,
            strict: false,
            timeout: None,
        }
    }
}

impl QueueConfig {
    /// Create a configuration with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Start the queue paused; call `start()` to begin admitting
    pub fn paused(mut self) -> Self {
        self.auto_start = false;
        self
    }

    /// Set the rate limit: at most `cap` admissions per `interval`
    pub fn with_rate_limit(mut self, cap: usize, interval: Duration) -> Self {
        self.interval_cap = cap;
        self.interval = interval;
        self
    }

    /// Carry running tasks into the next window's admission count
    pub fn with_carryover(mut self) -> Self {
        self.carryover_interval_count = true;
        self
    }

    /// Use sliding-window rate limiting
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Set the default per-task timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// True when the rate limiter never applies
    pub fn interval_ignored(&self) -> bool {
        self.interval_cap == usize::MAX || self.interval.is_zero()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.concurrency < 1 {
            return Err(QueueError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.interval_cap < 1 {
            return Err(QueueError::Config(
                "interval_cap must be at least 1".to_string(),
            ));
        }
        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(QueueError::Config("timeout must be positive".to_string()));
            }
        }
        if self.strict && (self.interval.is_zero() || self.interval_cap == usize::MAX) {
            return Err(QueueError::Config(
                "strict mode requires a non-zero interval and a finite interval_cap".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = QueueConfig::default();
        assert_eq!(config.concurrency, usize::MAX);
        assert!(config.auto_start);
        assert_eq!(config.interval_cap, usize::MAX);
        assert_eq!(config.interval, Duration::ZERO);
        assert!(!config.carryover_interval_count);
        assert!(!config.strict);
        assert!(config.timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builders() {
        let config = QueueConfig::new()
            .with_concurrency(4)
            .with_rate_limit(10, Duration::from_secs(1))
            .with_timeout(Duration::from_millis(500))
            .with_carryover()
            .paused();

        assert_eq!(config.concurrency, 4);
        assert_eq!(config.interval_cap, 10);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.timeout, Some(Duration::from_millis(500)));
        assert!(config.carryover_interval_count);
        assert!(!config.auto_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_concurrency() {
        let config = QueueConfig::new().with_concurrency(0);
        assert!(matches!(config.validate(), Err(QueueError::Config(_))));
    }

    #[test]
    fn test_config_rejects_zero_interval_cap() {
        let config = QueueConfig::new().with_rate_limit(0, Duration::from_secs(1));
        assert!(matches!(config.validate(), Err(QueueError::Config(_))));
    }

    #[test]
    fn test_config_rejects_zero_timeout() {
        let config = QueueConfig::new().with_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(QueueError::Config(_))));
    }

    #[test]
    fn test_strict_requires_interval() {
        let config = QueueConfig::new().strict().with_rate_limit(2, Duration::ZERO);
        assert!(matches!(config.validate(), Err(QueueError::Config(_))));
    }

    #[test]
    fn test_strict_requires_finite_cap() {
        let config = QueueConfig::new()
            .strict()
            .with_rate_limit(usize::MAX, Duration::from_secs(1));
        assert!(matches!(config.validate(), Err(QueueError::Config(_))));
    }

    #[test]
    fn test_strict_valid() {
        let config = QueueConfig::new()
            .strict()
            .with_rate_limit(2, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_ignored() {
        assert!(QueueConfig::new().interval_ignored());
        assert!(QueueConfig::new()
            .with_rate_limit(5, Duration::ZERO)
            .interval_ignored());
        assert!(QueueConfig::new()
            .with_rate_limit(usize::MAX, Duration::from_secs(1))
            .interval_ignored());
        assert!(!QueueConfig::new()
            .with_rate_limit(5, Duration::from_secs(1))
            .interval_ignored());
    }

    #[test]
    fn test_config_serialization() {
        let config = QueueConfig::new()
            .with_concurrency(2)
            .with_rate_limit(10, Duration::from_secs(1));
        let json = serde_json::to_string(&config).unwrap();
        let parsed: QueueConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
