//! What-if run parameters and resource limits.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Parameters that shape and bound a what-if run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatIfConfig {
    /// Simulated seconds advanced per step.
    pub step_seconds: u32,
    /// Largest horizon a caller may request.
    pub max_horizon_minutes: u32,
    /// Horizon used when a scenario does not name one.
    pub default_horizon_minutes: u32,
    /// Gap to the train ahead below which the signal shows red (km).
    pub signal_red_km: f64,
    /// Gap to the train ahead below which the signal shows yellow (km).
    pub signal_yellow_km: f64,
    /// Speed cap under a yellow aspect (km/h).
    pub yellow_speed_kmh: f64,
    /// Speed assumed for ETA when a train is effectively stopped (km/h).
    pub stopped_eta_speed_kmh: f64,
    /// Multiplier applied to the base speed of a train with an added delay.
    pub delay_speed_factor: f64,
    /// Width of the time bucket used to deduplicate predicted alerts.
    pub alert_dedup_window_secs: u64,
    /// Optional wall-clock bound enforced by cancelling the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for WhatIfConfig {
    fn default() -> Self {
        Self {
            step_seconds: 10,
            max_horizon_minutes: 24 * 60,
            default_horizon_minutes: 60,
            signal_red_km: 2.0,
            signal_yellow_km: 5.0,
            yellow_speed_kmh: 30.0,
            stopped_eta_speed_kmh: 30.0,
            delay_speed_factor: 0.5,
            alert_dedup_window_secs: 300,
            timeout_ms: None,
        }
    }
}

impl WhatIfConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.step_seconds == 0 {
            return Err(ValidationError::InvalidWhatIfConstraints {
                reason: "step_seconds must be > 0".to_string(),
            });
        }
        if self.max_horizon_minutes == 0 {
            return Err(ValidationError::InvalidWhatIfConstraints {
                reason: "max_horizon_minutes must be > 0".to_string(),
            });
        }
        if self.default_horizon_minutes > self.max_horizon_minutes {
            return Err(ValidationError::InvalidWhatIfConstraints {
                reason: "default_horizon_minutes exceeds max_horizon_minutes".to_string(),
            });
        }
        if !(self.signal_red_km > 0.0 && self.signal_red_km <= self.signal_yellow_km) {
            return Err(ValidationError::InvalidWhatIfConstraints {
                reason: "signal distances must satisfy 0 < red <= yellow".to_string(),
            });
        }
        if !(self.stopped_eta_speed_kmh > 0.0) {
            return Err(ValidationError::InvalidWhatIfConstraints {
                reason: "stopped_eta_speed_kmh must be > 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.delay_speed_factor) {
            return Err(ValidationError::InvalidWhatIfConstraints {
                reason: "delay_speed_factor must lie in [0, 1]".to_string(),
            });
        }
        if self.alert_dedup_window_secs == 0 {
            return Err(ValidationError::InvalidWhatIfConstraints {
                reason: "alert_dedup_window_secs must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Check a requested horizon against the limits.
    pub fn validate_horizon(&self, horizon_minutes: u32) -> Result<(), ValidationError> {
        if horizon_minutes == 0 {
            return Err(ValidationError::InvalidWhatIfConstraints {
                reason: "horizon must be at least one minute".to_string(),
            });
        }
        if horizon_minutes > self.max_horizon_minutes {
            return Err(ValidationError::InvalidWhatIfConstraints {
                reason: format!(
                    "horizon {horizon_minutes} min exceeds the maximum of {} min",
                    self.max_horizon_minutes
                ),
            });
        }
        if u64::from(horizon_minutes) * 60 < u64::from(self.step_seconds) {
            return Err(ValidationError::InvalidWhatIfConstraints {
                reason: "horizon is shorter than a single step".to_string(),
            });
        }
        Ok(())
    }

    /// Number of steps a horizon expands to.
    #[must_use]
    pub fn steps_for(&self, horizon_minutes: u32) -> u64 {
        u64::from(horizon_minutes) * 60 / u64::from(self.step_seconds.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        WhatIfConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_limits() {
        let mut c = WhatIfConfig::default();
        c.step_seconds = 0;
        assert!(c.validate().is_err());

        let mut c = WhatIfConfig::default();
        c.max_horizon_minutes = 0;
        assert!(c.validate().is_err());

        let mut c = WhatIfConfig::default();
        c.signal_yellow_km = 1.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn horizon_bounds() {
        let c = WhatIfConfig::default();
        assert!(c.validate_horizon(0).is_err());
        assert!(c.validate_horizon(c.max_horizon_minutes + 1).is_err());
        c.validate_horizon(60).unwrap();
        assert_eq!(c.steps_for(60), 360);
    }
}
