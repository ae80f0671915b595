//! What-if run output.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::Alert;
use crate::block::BlockId;
use crate::train::{Train, TrainId};

/// Stable identifier for one what-if run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioRunId(Uuid);

impl ScenarioRunId {
    /// Create a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScenarioRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScenarioRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Aggregate figures for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetrics {
    pub duration_simulated_min: u32,
    pub steps: u64,
    pub simulated_seconds: u64,
    /// Mean of the per-train accumulated delay.
    pub average_delay_min: f64,
    pub max_delay_min: f64,
    /// Trains that reached the end of the route within the horizon.
    pub trains_arrived: usize,
    pub conflict_count: usize,
}

/// Everything a what-if run produces. Read-only to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scenario_id: ScenarioRunId,
    pub scenario_name: String,
    /// Train states at the end of the horizon, speeds as of the last step.
    pub final_trains: Vec<Train>,
    /// Deduplicated rear-end alerts raised during the run.
    pub predicted_conflicts: Vec<Alert>,
    /// Block -> percentage of the horizon it was occupied.
    pub block_utilization: BTreeMap<BlockId, f64>,
    /// Train -> minutes spent held (target speed below 1 km/h) before arrival.
    pub max_delays: BTreeMap<TrainId, f64>,
    /// Train -> estimated arrival at the end of the route.
    pub etas: BTreeMap<TrainId, DateTime<Utc>>,
    pub metrics: SimulationMetrics,
}

impl SimulationResult {
    /// Final state of one train.
    #[must_use]
    pub fn train(&self, id: &TrainId) -> Option<&Train> {
        self.final_trains.iter().find(|t| &t.id == id)
    }

    /// Utilization percentage of one block (0 for unknown blocks).
    #[must_use]
    pub fn utilization(&self, id: &BlockId) -> f64 {
        self.block_utilization.get(id).copied().unwrap_or(0.0)
    }
}
