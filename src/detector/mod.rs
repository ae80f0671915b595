//! Conflict detection over a snapshot of trains.
//!
//! Every rule is a stateless function that recomputes its alerts from scratch;
//! corridors carry at most a few dozen trains so an O(n log n) sort per pass is
//! cheap. [`ConflictDetector`] bundles the rules used by the live engine.

/// Overspeed rule.
pub mod overspeed;
/// Rear-end proximity rule.
pub mod rear_end;
/// Externally scored pairwise conflict rule.
pub mod scoring;

pub use overspeed::check_overspeed;
pub use rear_end::check_rear_end;
pub use scoring::{check_predicted_conflicts, ConflictFeatures, RiskScorer};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::block::{block_at, Block};
use crate::error::ValidationError;
use crate::train::Train;

/// Thresholds for the detection rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Gap below which adjacent trains raise a rear-end alert (km).
    pub safe_distance_km: f64,
    /// Gap below which a rear-end alert is CRITICAL (km).
    pub critical_distance_km: f64,
    /// Excess over the limit above which overspeed is MAJOR (km/h).
    pub overspeed_major_excess_kmh: f64,
    /// Scored probability above which a MAJOR alert is raised.
    pub conflict_major_probability: f64,
    /// Scored probability above which the alert is CRITICAL.
    pub conflict_critical_probability: f64,
    /// Track identifier passed to the risk scorer.
    pub track_id: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            safe_distance_km: 2.0,
            critical_distance_km: 1.0,
            overspeed_major_excess_kmh: 20.0,
            conflict_major_probability: 0.6,
            conflict_critical_probability: 0.8,
            track_id: 1,
        }
    }
}

impl DetectorConfig {
    /// Validate thresholds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.critical_distance_km > 0.0 && self.critical_distance_km <= self.safe_distance_km) {
            return Err(ValidationError::InvalidConfig {
                reason: "detector distances must satisfy 0 < critical_distance_km <= safe_distance_km".to_string(),
            });
        }
        if self.overspeed_major_excess_kmh < 0.0 {
            return Err(ValidationError::InvalidConfig {
                reason: "overspeed_major_excess_kmh must be >= 0".to_string(),
            });
        }
        let (major, critical) = (self.conflict_major_probability, self.conflict_critical_probability);
        if !((0.0..=1.0).contains(&major) && (0.0..=1.0).contains(&critical) && major <= critical) {
            return Err(ValidationError::InvalidConfig {
                reason: "conflict probabilities must satisfy 0 <= major <= critical <= 1".to_string(),
            });
        }
        Ok(())
    }
}

/// The full live detection pass: rear-end, overspeed and (optionally) scored conflicts.
#[derive(Clone, Default)]
pub struct ConflictDetector {
    config: DetectorConfig,
    scorer: Option<Arc<dyn RiskScorer>>,
}

impl fmt::Debug for ConflictDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflictDetector")
            .field("config", &self.config)
            .field("scorer", &self.scorer.is_some())
            .finish()
    }
}

impl ConflictDetector {
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        Self { config, scorer: None }
    }

    /// Attaches a risk-scoring capability.
    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn RiskScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    #[must_use]
    pub fn has_scorer(&self) -> bool {
        self.scorer.is_some()
    }

    /// Runs every rule over `trains`.
    ///
    /// Block speed limits are scaled by `limit_factor` (the weather factor)
    /// before the overspeed comparison.
    #[must_use]
    pub fn detect(&self, trains: &[&Train], blocks: &[Block], limit_factor: f64) -> Vec<Alert> {
        let mut alerts = check_rear_end(trains.iter().copied(), &self.config);

        for train in trains {
            if let Some(block) = block_at(blocks, train.distance) {
                alerts.extend(check_overspeed(train, block, limit_factor, &self.config));
            }
        }

        if let Some(scorer) = &self.scorer {
            alerts.extend(check_predicted_conflicts(trains.iter().copied(), scorer.as_ref(), &self.config));
        }

        alerts
    }
}
