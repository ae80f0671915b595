//! Declarative what-if perturbations.
//!
//! A scenario is pure input: it names hypothetical changes by train and block
//! id. Ids that do not exist in the sandbox are ignored when the scenario is
//! applied, since modifiers are best-effort overlays.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::block::BlockId;
use crate::train::TrainId;
use crate::weather::WeatherCondition;

/// Hypothetical changes applied to a sandboxed copy of the live state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioModifier {
    /// Train -> added delay in minutes.
    pub train_delays: BTreeMap<TrainId, f64>,
    /// Blocks closed for maintenance.
    pub block_maintenance: BTreeSet<BlockId>,
    /// Block -> overriding speed limit (km/h).
    pub speed_limits: BTreeMap<BlockId, f64>,
    /// Train -> priority (1 lowest, 5 highest).
    pub priorities: BTreeMap<TrainId, u8>,
    /// Trains moved onto the parallel loop line.
    pub reroute_trains: BTreeSet<TrainId>,
    pub weather: WeatherCondition,
}

impl ScenarioModifier {
    /// Starts an empty modifier.
    #[must_use]
    pub fn builder() -> ScenarioModifierBuilder {
        ScenarioModifierBuilder::default()
    }

    /// True when the modifier changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.train_delays.is_empty()
            && self.block_maintenance.is_empty()
            && self.speed_limits.is_empty()
            && self.priorities.is_empty()
            && self.reroute_trains.is_empty()
            && self.weather == WeatherCondition::Clear
    }
}

/// Builder for [`ScenarioModifier`].
#[derive(Debug, Clone, Default)]
pub struct ScenarioModifierBuilder {
    modifier: ScenarioModifier,
}

impl ScenarioModifierBuilder {
    #[must_use]
    pub fn delay(mut self, train: impl Into<TrainId>, minutes: f64) -> Self {
        self.modifier.train_delays.insert(train.into(), minutes);
        self
    }

    #[must_use]
    pub fn maintenance(mut self, block: impl Into<BlockId>) -> Self {
        self.modifier.block_maintenance.insert(block.into());
        self
    }

    #[must_use]
    pub fn speed_limit(mut self, block: impl Into<BlockId>, limit_kmh: f64) -> Self {
        self.modifier.speed_limits.insert(block.into(), limit_kmh);
        self
    }

    /// Sets a priority, clamped into 1..=5.
    #[must_use]
    pub fn priority(mut self, train: impl Into<TrainId>, priority: u8) -> Self {
        self.modifier.priorities.insert(train.into(), priority.clamp(1, 5));
        self
    }

    #[must_use]
    pub fn reroute(mut self, train: impl Into<TrainId>) -> Self {
        self.modifier.reroute_trains.insert(train.into());
        self
    }

    #[must_use]
    pub const fn weather(mut self, weather: WeatherCondition) -> Self {
        self.modifier.weather = weather;
        self
    }

    #[must_use]
    pub fn build(self) -> ScenarioModifier {
        self.modifier
    }
}

fn default_name() -> String {
    "New Scenario".to_string()
}

fn default_layout() -> String {
    "default".to_string()
}

const fn default_horizon() -> u32 {
    60
}

/// A named scenario with its simulation horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub modifiers: ScenarioModifier,
    #[serde(default = "default_layout")]
    pub layout_name: String,
    #[serde(default = "default_horizon")]
    pub simulation_horizon_minutes: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            modifiers: ScenarioModifier::default(),
            layout_name: default_layout(),
            simulation_horizon_minutes: default_horizon(),
        }
    }
}

impl ScenarioConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, modifiers: ScenarioModifier) -> Self {
        Self {
            name: name.into(),
            modifiers,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_horizon(mut self, minutes: u32) -> Self {
        self.simulation_horizon_minutes = minutes;
        self
    }
}
