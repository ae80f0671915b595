//! Isolated what-if sandbox.
//!
//! The engine owns deep copies of the trains and blocks it was built from and
//! never holds a reference back into live state. A run advances the copy in
//! fixed steps, applying block-occupancy signal propagation, and stops trains
//! at the end of the route rather than wrapping them.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, trace, warn};

use crate::alert::{Alert, AlertKey};
use crate::block::{block_at, Block, BlockId, BlockStatus};
use crate::detector::{check_rear_end, DetectorConfig};
use crate::error::{CorridorResult, ExecutionError};
use crate::route::Route;
use crate::scenario::ScenarioConfig;
use crate::train::{Direction, Train, TrainId, TrainStatus};

use super::cancel::CancellationToken;
use super::constraints::WhatIfConfig;
use super::result::{ScenarioRunId, SimulationMetrics, SimulationResult};

/// Signal shown to a train based on the gap to the train ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAspect {
    /// Too close: stop.
    Red,
    /// Close: approach at reduced speed.
    Yellow,
    /// Clear.
    Green,
}

impl SignalAspect {
    /// Aspect for a gap in km under the given limits.
    #[must_use]
    pub fn for_gap(gap_km: f64, config: &WhatIfConfig) -> Self {
        if gap_km < config.signal_red_km {
            Self::Red
        } else if gap_km < config.signal_yellow_km {
            Self::Yellow
        } else {
            Self::Green
        }
    }

    fn restrict(self, speed: f64, config: &WhatIfConfig) -> f64 {
        match self {
            Self::Red => 0.0,
            Self::Yellow => speed.min(config.yellow_speed_kmh),
            Self::Green => speed,
        }
    }
}

/// Position of the previously processed train in a direction group.
#[derive(Clone, Copy)]
struct Ahead {
    progress: f64,
    rerouted: bool,
}

/// A single-shot what-if simulation over a private copy of corridor state.
#[derive(Debug, Clone)]
pub struct WhatIfEngine {
    route: Route,
    config: WhatIfConfig,
    detector: DetectorConfig,
    scenario_name: String,

    trains: BTreeMap<TrainId, Train>,
    blocks: Vec<Block>,
    rerouted: BTreeSet<TrainId>,
    priorities: BTreeMap<TrainId, u8>,

    started_at: DateTime<Utc>,
    elapsed_secs: u64,
    steps: u64,

    target_speeds: BTreeMap<TrainId, f64>,
    delays: BTreeMap<TrainId, f64>,
    etas: BTreeMap<TrainId, DateTime<Utc>>,
    occupancy: BTreeMap<BlockId, u64>,
    conflicts: Vec<Alert>,
    seen: HashSet<AlertKey>,
}

impl WhatIfEngine {
    /// Deep-copies a snapshot of trains and blocks into a new sandbox.
    ///
    /// Blocks are kept ordered by their start so block lookup is stable.
    pub fn new<'a, T, B>(trains: T, blocks: B) -> Self
    where
        T: IntoIterator<Item = &'a Train>,
        B: IntoIterator<Item = &'a Block>,
    {
        let trains: BTreeMap<TrainId, Train> = trains.into_iter().map(|t| (t.id.clone(), t.clone())).collect();
        let mut blocks: Vec<Block> = blocks.into_iter().cloned().collect();
        blocks.sort_by(|a, b| a.start_km.total_cmp(&b.start_km));

        let delays = trains.keys().map(|id| (id.clone(), 0.0)).collect();
        let occupancy = blocks.iter().map(|b| (b.id.clone(), 0)).collect();

        Self {
            route: Route::sc_kzj(),
            config: WhatIfConfig::default(),
            detector: DetectorConfig::default(),
            scenario_name: ScenarioConfig::default().name,
            trains,
            blocks,
            rerouted: BTreeSet::new(),
            priorities: BTreeMap::new(),
            started_at: Utc::now(),
            elapsed_secs: 0,
            steps: 0,
            target_speeds: BTreeMap::new(),
            delays,
            etas: BTreeMap::new(),
            occupancy,
            conflicts: Vec::new(),
            seen: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_route(mut self, route: Route) -> Self {
        self.route = route;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: WhatIfConfig) -> Self {
        self.config = config;
        self
    }

    /// Rear-end thresholds used for the predicted conflict list.
    #[must_use]
    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    /// Applies a scenario's modifiers to the sandbox only.
    ///
    /// Ids naming trains or blocks that are not in the sandbox are skipped.
    pub fn apply_scenario(&mut self, scenario: &ScenarioConfig) {
        let modifiers = &scenario.modifiers;
        self.scenario_name = scenario.name.clone();

        for id in &modifiers.reroute_trains {
            if self.trains.contains_key(id) {
                self.rerouted.insert(id.clone());
            } else {
                debug!(train = %id, "reroute names an unknown train, ignoring");
            }
        }

        for (id, priority) in &modifiers.priorities {
            if self.trains.contains_key(id) {
                self.priorities.insert(id.clone(), (*priority).clamp(1, 5));
            } else {
                debug!(train = %id, "priority names an unknown train, ignoring");
            }
        }

        for (id, minutes) in &modifiers.train_delays {
            match self.trains.get_mut(id) {
                Some(train) if *minutes > 0.0 => train.speed *= self.config.delay_speed_factor,
                Some(_) => debug!(train = %id, minutes, "non-positive delay, ignoring"),
                None => debug!(train = %id, "delay names an unknown train, ignoring"),
            }
        }

        let factor = modifiers.weather.scenario_factor();
        for train in self.trains.values_mut() {
            train.speed *= factor;
        }

        for id in &modifiers.block_maintenance {
            match self.blocks.iter_mut().find(|b| &b.id == id) {
                Some(block) => {
                    block.status = BlockStatus::Maintenance;
                    block.speed_limit = 0.0;
                }
                None => debug!(block = %id, "maintenance names an unknown block, ignoring"),
            }
        }

        for (id, limit) in &modifiers.speed_limits {
            if modifiers.block_maintenance.contains(id) {
                continue;
            }
            if !limit.is_finite() || *limit < 0.0 {
                warn!(block = %id, limit, "invalid speed limit override, ignoring");
                continue;
            }
            match self.blocks.iter_mut().find(|b| &b.id == id) {
                Some(block) => block.speed_limit = *limit,
                None => debug!(block = %id, "speed limit names an unknown block, ignoring"),
            }
        }

        debug!(
            scenario = %self.scenario_name,
            weather = %modifiers.weather,
            rerouted = self.rerouted.len(),
            "scenario applied"
        );
    }

    /// Advances the sandbox by one step.
    pub fn step(&mut self) {
        let step = f64::from(self.config.step_seconds);
        self.elapsed_secs += u64::from(self.config.step_seconds);
        self.steps += 1;
        let now = self.now();
        let length = self.route.length_km();

        for direction in [Direction::Eastbound, Direction::Westbound] {
            let order = self.processing_order(direction);
            let mut ahead: Option<Ahead> = None;

            for id in order {
                let rerouted = self.rerouted.contains(&id);
                let Some(train) = self.trains.get_mut(&id) else {
                    continue;
                };
                let sign = direction.sign();

                if train.status == TrainStatus::Stopped {
                    self.target_speeds.insert(id, 0.0);
                    ahead = Some(Ahead {
                        progress: train.distance * sign,
                        rerouted,
                    });
                    continue;
                }

                let mut target = train.speed;
                if let Some(block) = block_at(&self.blocks, train.distance) {
                    if !(rerouted && block.is_under_maintenance()) {
                        target = target.min(block.speed_limit);
                    }
                }

                if let Some(front) = ahead {
                    if !rerouted && !front.rerouted {
                        let gap = front.progress - train.distance * sign;
                        let aspect = SignalAspect::for_gap(gap, &self.config);
                        target = aspect.restrict(target, &self.config);
                        trace!(train = %id, gap, ?aspect, "signal");
                    }
                }

                train.distance += target / 3600.0 * step * sign;

                let remaining = match direction {
                    Direction::Eastbound => length - train.distance,
                    Direction::Westbound => train.distance,
                };
                if target < 1.0 && remaining > 0.0 {
                    *self.delays.entry(id.clone()).or_insert(0.0) += step / 60.0;
                }
                if remaining <= 0.0 {
                    train.distance = train.distance.clamp(0.0, length);
                    train.halt();
                    debug!(train = %id, elapsed_secs = self.elapsed_secs, "train reached end of route");
                }

                let point = self.route.interpolate(train.distance);
                train.set_position(point);

                let remaining = remaining.max(0.0);
                let eta_speed = if target < 1.0 { self.config.stopped_eta_speed_kmh } else { target };
                let eta_secs = (remaining / eta_speed * 3600.0).round() as i64;
                self.etas.insert(id.clone(), now + Duration::seconds(eta_secs));

                trace!(train = %id, distance = train.distance, target, "step");
                ahead = Some(Ahead {
                    progress: train.distance * sign,
                    rerouted,
                });
                self.target_speeds.insert(id, target);
            }
        }

        self.record_occupancy();
        self.record_conflicts(now);
    }

    /// Target speed chosen for a train in the most recent step.
    #[must_use]
    pub fn target_speed(&self, id: &TrainId) -> Option<f64> {
        self.target_speeds.get(id).copied()
    }

    /// Current sandbox state of a train.
    #[must_use]
    pub fn train(&self, id: &TrainId) -> Option<&Train> {
        self.trains.get(id)
    }

    pub fn trains(&self) -> impl Iterator<Item = &Train> {
        self.trains.values()
    }

    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[must_use]
    pub const fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    #[must_use]
    pub fn is_rerouted(&self, id: &TrainId) -> bool {
        self.rerouted.contains(id)
    }

    /// Runs the full horizon.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid configuration or horizon.
    pub fn run(self, horizon_minutes: u32) -> CorridorResult<SimulationResult> {
        self.run_with_cancel(horizon_minutes, &CancellationToken::new())
    }

    /// Runs the full horizon, checking `token` before every step.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid configuration or horizon and
    /// `ExecutionError::Cancelled` if the token fires mid-run.
    pub fn run_with_cancel(
        mut self,
        horizon_minutes: u32,
        token: &CancellationToken,
    ) -> CorridorResult<SimulationResult> {
        self.config.validate()?;
        self.config.validate_horizon(horizon_minutes)?;

        let steps = self.config.steps_for(horizon_minutes);
        let started = Instant::now();
        for completed in 0..steps {
            if token.is_cancelled() {
                info!(scenario = %self.scenario_name, completed, steps, "what-if run cancelled");
                return Err(ExecutionError::Cancelled {
                    completed_steps: completed,
                }
                .into());
            }
            self.step();
        }

        let result = self.finish(horizon_minutes);
        info!(
            scenario = %result.scenario_name,
            steps,
            conflicts = result.metrics.conflict_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "what-if run complete"
        );
        Ok(result)
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = i64::try_from(self.elapsed_secs).unwrap_or(i64::MAX);
        self.started_at + Duration::seconds(elapsed)
    }

    /// Front-most train first; at equal progress higher priority goes first.
    fn processing_order(&self, direction: Direction) -> Vec<TrainId> {
        let sign = direction.sign();
        let mut group: Vec<&Train> = self.trains.values().filter(|t| t.direction == direction).collect();
        group.sort_by(|a, b| {
            let (pa, pb) = (a.distance * sign, b.distance * sign);
            pb.total_cmp(&pa)
                .then_with(|| self.priority(&b.id).cmp(&self.priority(&a.id)))
                .then_with(|| a.id.cmp(&b.id))
        });
        group.into_iter().map(|t| t.id.clone()).collect()
    }

    fn priority(&self, id: &TrainId) -> u8 {
        self.priorities.get(id).copied().unwrap_or(1)
    }

    fn record_occupancy(&mut self) {
        let mut covered: BTreeSet<BlockId> = BTreeSet::new();
        for train in self.trains.values() {
            if let Some(block) = block_at(&self.blocks, train.distance) {
                covered.insert(block.id.clone());
            }
        }
        for id in covered {
            *self.occupancy.entry(id).or_insert(0) += 1;
        }
    }

    /// Rear-end check run separately on the main line and the loop line.
    fn record_conflicts(&mut self, now: DateTime<Utc>) {
        let bucket = self.elapsed_secs / self.config.alert_dedup_window_secs.max(1);
        let (looped, main): (Vec<&Train>, Vec<&Train>) =
            self.trains.values().partition(|t| self.rerouted.contains(&t.id));

        let mut alerts = check_rear_end(main, &self.detector);
        alerts.extend(check_rear_end(looped, &self.detector));

        for mut alert in alerts {
            if self.seen.insert(alert.key(bucket)) {
                alert.time = now;
                self.conflicts.push(alert);
            }
        }
    }

    fn finish(self, horizon_minutes: u32) -> SimulationResult {
        let horizon_secs = f64::from(horizon_minutes) * 60.0;
        let step = f64::from(self.config.step_seconds);
        let block_utilization = self
            .occupancy
            .iter()
            .map(|(id, count)| (id.clone(), *count as f64 * step / horizon_secs * 100.0))
            .collect();

        let length = self.route.length_km();
        let trains_arrived = self
            .trains
            .values()
            .filter(|t| match t.direction {
                Direction::Eastbound => t.distance >= length,
                Direction::Westbound => t.distance <= 0.0,
            })
            .count();

        let delay_values: Vec<f64> = self.delays.values().copied().collect();
        let max_delay_min = delay_values.iter().copied().fold(0.0, f64::max);
        let average_delay_min = if delay_values.is_empty() {
            0.0
        } else {
            delay_values.iter().sum::<f64>() / delay_values.len() as f64
        };

        let target_speeds = self.target_speeds;
        let final_trains = self
            .trains
            .into_values()
            .map(|mut t| {
                if let Some(speed) = target_speeds.get(&t.id) {
                    t.speed = *speed;
                }
                t
            })
            .collect();

        SimulationResult {
            scenario_id: ScenarioRunId::new(),
            scenario_name: self.scenario_name,
            final_trains,
            metrics: SimulationMetrics {
                duration_simulated_min: horizon_minutes,
                steps: self.steps,
                simulated_seconds: self.elapsed_secs,
                average_delay_min,
                max_delay_min,
                trains_arrived,
                conflict_count: self.conflicts.len(),
            },
            predicted_conflicts: self.conflicts,
            block_utilization,
            max_delays: self.delays,
            etas: self.etas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioModifier;
    use crate::weather::WeatherCondition;

    fn train(id: &str, distance: f64, speed: f64) -> Train {
        Train::builder(id, format!("T{id}")).distance(distance).speed(speed).build().unwrap()
    }

    fn engine(trains: &[Train]) -> WhatIfEngine {
        let blocks = Route::sc_kzj().station_blocks();
        WhatIfEngine::new(trains, &blocks)
    }

    #[test]
    fn red_signal_stops_trailing_train() {
        let trains = [train("A", 21.5, 60.0), train("B", 20.0, 60.0)];
        let mut e = engine(&trains);
        e.step();
        assert_eq!(e.target_speed(&TrainId::new("B")), Some(0.0));
        assert_eq!(e.target_speed(&TrainId::new("A")), Some(60.0));
    }

    #[test]
    fn yellow_signal_caps_speed() {
        let trains = [train("A", 24.0, 80.0), train("B", 20.0, 80.0)];
        let mut e = engine(&trains);
        e.step();
        assert_eq!(e.target_speed(&TrainId::new("B")), Some(30.0));
    }

    #[test]
    fn rerouted_trains_ignore_signals() {
        let trains = [train("A", 21.5, 60.0), train("B", 20.0, 60.0)];
        let mut e = engine(&trains);
        e.apply_scenario(&ScenarioConfig::new("loop", ScenarioModifier::builder().reroute("B").build()));
        e.step();
        assert_eq!(e.target_speed(&TrainId::new("B")), Some(60.0));
        assert!(e.is_rerouted(&TrainId::new("B")));
    }

    #[test]
    fn maintenance_block_holds_only_main_line_trains() {
        let trains = [train("A", 25.0, 60.0), train("B", 40.0, 60.0)];
        let mut e = engine(&trains);
        let modifiers = ScenarioModifier::builder().maintenance("BLK-GT-BN").reroute("A").build();
        e.apply_scenario(&ScenarioConfig::new("closure", modifiers));
        e.step();
        assert_eq!(e.target_speed(&TrainId::new("A")), Some(60.0));

        let mut e = engine(&trains);
        e.apply_scenario(&ScenarioConfig::new("closure", ScenarioModifier::builder().maintenance("BLK-GT-BN").build()));
        e.step();
        assert_eq!(e.target_speed(&TrainId::new("A")), Some(0.0));
        assert_eq!(e.blocks()[3].status, BlockStatus::Maintenance);
    }

    #[test]
    fn scenario_scales_speeds() {
        let trains = [train("A", 10.0, 80.0), train("B", 60.0, 80.0)];
        let mut e = engine(&trains);
        let modifiers = ScenarioModifier::builder()
            .delay("A", 15.0)
            .weather(WeatherCondition::Storm)
            .delay("ghost", 5.0)
            .build();
        e.apply_scenario(&ScenarioConfig::new("storm", modifiers));
        assert!((e.train(&TrainId::new("A")).unwrap().speed - 16.0).abs() < 1e-9);
        assert!((e.train(&TrainId::new("B")).unwrap().speed - 32.0).abs() < 1e-9);
    }

    #[test]
    fn sandbox_does_not_alias_source() {
        let trains = vec![train("A", 10.0, 80.0)];
        let mut e = engine(&trains);
        e.apply_scenario(&ScenarioConfig::new("storm", ScenarioModifier::builder().weather(WeatherCondition::Storm).build()));
        e.step();
        assert_eq!(trains[0].speed, 80.0);
        assert_eq!(trains[0].distance, 10.0);
    }

    #[test]
    fn trains_stop_at_route_end() {
        let trains = [train("A", 136.9, 100.0)];
        let result = engine(&trains).run(5).unwrap();
        let a = result.train(&TrainId::new("A")).unwrap();
        assert_eq!(a.distance, 137.0);
        assert_eq!(a.status, TrainStatus::Stopped);
        assert_eq!(a.speed, 0.0);
        assert_eq!(result.metrics.trains_arrived, 1);
        assert_eq!(result.max_delays[&TrainId::new("A")], 0.0);
    }

    #[test]
    fn westbound_trains_stop_at_origin() {
        let mut t = train("W", 0.1, 100.0);
        t.direction = Direction::Westbound;
        let result = engine(&[t]).run(5).unwrap();
        let w = result.train(&TrainId::new("W")).unwrap();
        assert_eq!(w.distance, 0.0);
        assert_eq!(w.status, TrainStatus::Stopped);
    }

    #[test]
    fn held_train_accumulates_delay() {
        let trains = [train("A", 21.5, 0.0), train("B", 20.0, 60.0)];
        let result = engine(&trains).run(10).unwrap();
        assert!((result.max_delays[&TrainId::new("B")] - 10.0).abs() < 1e-9);
        assert!((result.metrics.max_delay_min - 10.0).abs() < 1e-9);
    }

    #[test]
    fn priority_breaks_ties_at_equal_distance() {
        let trains = [train("A", 20.0, 60.0), train("B", 20.0, 60.0)];
        let mut e = engine(&trains);
        e.apply_scenario(&ScenarioConfig::new("prio", ScenarioModifier::builder().priority("B", 5).build()));
        e.step();
        assert_eq!(e.target_speed(&TrainId::new("B")), Some(60.0));
        assert_eq!(e.target_speed(&TrainId::new("A")), Some(0.0));
    }

    #[test]
    fn conflicts_are_deduplicated_within_a_window() {
        let trains = [train("A", 21.5, 0.0), train("B", 20.0, 0.0)];
        let result = engine(&trains).run(4).unwrap();
        assert_eq!(result.predicted_conflicts.len(), 1);
        assert_eq!(result.metrics.conflict_count, 1);
    }

    #[test]
    fn rerouted_pairs_do_not_conflict() {
        let trains = [train("A", 21.5, 0.0), train("B", 20.0, 0.0)];
        let mut e = engine(&trains);
        e.apply_scenario(&ScenarioConfig::new("loop", ScenarioModifier::builder().reroute("A").build()));
        assert!(e.run(4).unwrap().predicted_conflicts.is_empty());
    }

    #[test]
    fn cancelled_run_reports_progress() {
        let token = CancellationToken::new();
        token.cancel();
        let err = engine(&[train("A", 10.0, 60.0)]).run_with_cancel(60, &token).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CorridorError::Execution(ExecutionError::Cancelled { completed_steps: 0 })
        ));
    }

    #[test]
    fn rejects_out_of_range_horizon() {
        assert!(engine(&[]).run(0).unwrap_err().is_validation());
        assert!(engine(&[]).run(100_000).unwrap_err().is_validation());
    }

    #[test]
    fn etas_are_reported() {
        let trains = [train("A", 107.0, 60.0)];
        let result = engine(&trains).run(1).unwrap();
        let eta = result.etas[&TrainId::new("A")];
        assert!(eta > Utc::now());
    }
}
