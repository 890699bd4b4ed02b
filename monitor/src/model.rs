use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of one live monitor. At most one monitor may exist per key;
/// re-registering replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonitorKey {
    pub user: String,
    pub coin: String,
    pub window_secs: u64,
}

/// Durable projection of a monitor. This is exactly what the store
/// round-trips; the in-memory baseline price is deliberately absent and is
/// re-derived from the next live trade after every (re)start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorRecord {
    pub user: String,
    pub coin: String,
    pub window_seconds: u64,
    pub percentage_threshold: Decimal,
    #[serde(default)]
    pub paused: bool,
}

impl MonitorRecord {
    pub fn key(&self) -> MonitorKey {
        MonitorKey {
            user: self.user.clone(),
            coin: self.coin.clone(),
            window_secs: self.window_seconds,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("sampling window must be at least one second")]
    WindowTooShort,
    #[error("sampling window must be a whole number of seconds")]
    FractionalWindow,
    #[error("percentage threshold must not be negative, got {0}")]
    NegativeThreshold(Decimal),
}

/// Reject configurations the detector cannot act on. Windows are keyed and
/// persisted in whole seconds, so a fractional window is an error rather
/// than a silent round-down.
pub fn validate(window: Duration, threshold: Decimal) -> Result<(), ConfigError> {
    if window < Duration::from_secs(1) {
        return Err(ConfigError::WindowTooShort);
    }
    if window.subsec_nanos() != 0 {
        return Err(ConfigError::FractionalWindow);
    }
    if threshold.is_sign_negative() && !threshold.is_zero() {
        return Err(ConfigError::NegativeThreshold(threshold));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_sane_config() {
        assert!(validate(Duration::from_secs(60), Decimal::new(5, 1)).is_ok());
        assert!(validate(Duration::from_secs(1), Decimal::ZERO).is_ok());
    }

    #[test]
    fn validate_rejects_short_window() {
        assert_eq!(
            validate(Duration::from_millis(500), Decimal::ONE),
            Err(ConfigError::WindowTooShort)
        );
        assert_eq!(
            validate(Duration::ZERO, Decimal::ONE),
            Err(ConfigError::WindowTooShort)
        );
    }

    #[test]
    fn validate_rejects_fractional_window() {
        assert_eq!(
            validate(Duration::from_millis(90_500), Decimal::ONE),
            Err(ConfigError::FractionalWindow)
        );
        assert_eq!(
            validate(Duration::new(60, 1), Decimal::ONE),
            Err(ConfigError::FractionalWindow)
        );
    }

    #[test]
    fn validate_rejects_negative_threshold() {
        let neg = Decimal::new(-5, 1);
        assert_eq!(
            validate(Duration::from_secs(60), neg),
            Err(ConfigError::NegativeThreshold(neg))
        );
    }

    #[test]
    fn record_serializes_with_camel_case_fields() {
        let record = MonitorRecord {
            user: "alice".into(),
            coin: "BTC".into(),
            window_seconds: 60,
            percentage_threshold: Decimal::new(5, 1),
            paused: false,
        };

        let json = serde_json::to_string(&record).expect("record serializes");
        assert!(json.contains("\"windowSeconds\":60"));
        assert!(json.contains("\"percentageThreshold\":\"0.5\""));
        assert!(json.contains("\"paused\":false"));

        let back: MonitorRecord = serde_json::from_str(&json).expect("record parses");
        assert_eq!(back, record);
    }
}
