use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Live engine tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Wall-clock period between ticks.
    pub tick_interval_ms: u64,
    /// Simulated seconds advanced per tick.
    pub tick_seconds: f64,
    /// Upper bound for commanded speeds (km/h).
    pub max_speed_kmh: f64,
    /// Half-width of the uniform per-tick speed fluctuation; 0 disables it.
    pub speed_jitter_kmh: f64,
    pub jitter_seed: u64,
    /// Resume a delayed train once its injected hold has elapsed.
    pub resume_after_delay: bool,
    pub command_queue_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            tick_seconds: 1.0,
            max_speed_kmh: 120.0,
            speed_jitter_kmh: 0.0,
            jitter_seed: 0,
            resume_after_delay: false,
            command_queue_capacity: 1024,
        }
    }
}

impl LiveConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: &str| {
            Err(ValidationError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if self.tick_interval_ms == 0 {
            return invalid("live.tick_interval_ms must be > 0");
        }
        if !(self.tick_seconds.is_finite() && self.tick_seconds > 0.0) {
            return invalid("live.tick_seconds must be finite and > 0");
        }
        if !(self.max_speed_kmh.is_finite() && self.max_speed_kmh > 0.0) {
            return invalid("live.max_speed_kmh must be finite and > 0");
        }
        if !(self.speed_jitter_kmh.is_finite() && self.speed_jitter_kmh >= 0.0) {
            return invalid("live.speed_jitter_kmh must be finite and >= 0");
        }
        if self.command_queue_capacity == 0 {
            return invalid("live.command_queue_capacity must be > 0");
        }
        Ok(())
    }
}
