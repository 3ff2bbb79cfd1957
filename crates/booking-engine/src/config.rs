//! Engine configuration.
//!
//! Every knob has a default matching the behaviour booking pages have
//! historically relied on, so `EngineConfig::default()` is the normal
//! starting point. Collaborators that keep configuration in JSON can load
//! it with [`EngineConfig::from_json`]; missing fields fall back to their
//! defaults.

use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result};
use crate::timezone::{Disambiguation, GapPolicy};

/// Tunable policies for slot generation and assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which occurrence of a repeated (fall-back) local time a working-hours
    /// boundary maps to.
    pub ambiguity: Disambiguation,
    /// What to do with a working-hours boundary that falls into a
    /// spring-forward gap.
    pub gap: GapPolicy,
    /// Look-ahead window for the Least Busy algorithm, in days (default: 7).
    pub least_busy_window_days: u32,
    /// Longest date range an availability query may span, in days (default: 92).
    pub max_range_days: u32,
    /// Relative deviation from the average workload above which a member is
    /// reported as over- or underloaded (default: 0.3).
    pub rebalance_threshold: f64,
    /// Re-check each eligible member against their calendar before
    /// assignment (default: true).
    pub verify_eligibility: bool,
}

/// Longest Least Busy look-ahead window accepted by [`EngineConfig::validate`].
pub const MAX_LEAST_BUSY_WINDOW_DAYS: u32 = 365;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ambiguity: Disambiguation::Earlier,
            gap: GapPolicy::ClampForward,
            least_busy_window_days: 7,
            max_range_days: 92,
            rebalance_threshold: 0.3,
            verify_eligibility: true,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidDuration`] if the JSON is malformed or a
    /// window/threshold is out of range.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| BookingError::InvalidDuration(format!("engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check windows and thresholds.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_LEAST_BUSY_WINDOW_DAYS).contains(&self.least_busy_window_days) {
            return Err(BookingError::InvalidDuration(format!(
                "least_busy_window_days must be between 1 and {MAX_LEAST_BUSY_WINDOW_DAYS}, got {}",
                self.least_busy_window_days
            )));
        }
        if self.max_range_days == 0 {
            return Err(BookingError::InvalidDuration(
                "max_range_days must be at least 1".to_string(),
            ));
        }
        if !self.rebalance_threshold.is_finite() || self.rebalance_threshold < 0.0 {
            return Err(BookingError::InvalidDuration(format!(
                "rebalance_threshold must be a non-negative number, got {}",
                self.rebalance_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let config = EngineConfig::default();
        assert_eq!(config.ambiguity, Disambiguation::Earlier);
        assert_eq!(config.gap, GapPolicy::ClampForward);
        assert_eq!(config.least_busy_window_days, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"ambiguity": "later", "gap": "reject"}"#).unwrap();
        assert_eq!(config.ambiguity, Disambiguation::Later);
        assert_eq!(config.gap, GapPolicy::Reject);
        assert_eq!(config.max_range_days, 92);
    }

    #[test]
    fn test_from_json_rejects_zero_window() {
        let err = EngineConfig::from_json(r#"{"least_busy_window_days": 0}"#).unwrap_err();
        assert!(matches!(err, BookingError::InvalidDuration(_)));
    }

    #[test]
    fn test_from_json_rejects_huge_window() {
        let err = EngineConfig::from_json(r#"{"least_busy_window_days": 4000000000}"#).unwrap_err();
        assert!(matches!(err, BookingError::InvalidDuration(_)));

        let config = EngineConfig {
            least_busy_window_days: MAX_LEAST_BUSY_WINDOW_DAYS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        assert!(EngineConfig::from_json("{not json").is_err());
    }
}
