//! Authoritative live state and the per-tick update.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::advisor::generate_suggestions;
use crate::alert::{Alert, AlertKey};
use crate::block::{block_at, Block, BlockStatus};
use crate::detector::ConflictDetector;
use crate::journal::{ConflictLog, EventJournal, SuggestionLog, TrainEvent, TrainEventKind};
use crate::route::Route;
use crate::suggestion::{Action, Suggestion};
use crate::train::{Direction, Train, TrainId, TrainStatus};
use crate::weather::WeatherCondition;

use super::command::Command;
use super::config::LiveConfig;

/// Point-in-time view of the live engine, swapped in after every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    /// Number of completed ticks.
    pub tick: u64,
    pub trains: Vec<Train>,
    pub blocks: Vec<Block>,
    pub alerts: Vec<Alert>,
    pub suggestions: Vec<Suggestion>,
    pub weather: WeatherCondition,
    pub taken_at: DateTime<Utc>,
}

impl LiveSnapshot {
    #[must_use]
    pub fn train(&self, id: &TrainId) -> Option<&Train> {
        self.trains.iter().find(|t| &t.id == id)
    }
}

/// A timed hold created by an injected delay.
#[derive(Debug, Clone, Copy)]
struct Hold {
    remaining_secs: f64,
    resume_speed: f64,
    resume_status: TrainStatus,
}

pub(crate) struct LiveCore {
    route: Route,
    config: LiveConfig,
    detector: ConflictDetector,
    journal: Option<Arc<dyn EventJournal>>,
    commands: Receiver<Command>,

    trains: BTreeMap<TrainId, Train>,
    blocks: Vec<Block>,
    weather: WeatherCondition,
    alerts: Vec<Alert>,
    suggestions: Vec<Suggestion>,
    holds: BTreeMap<TrainId, Hold>,
    rng: ChaCha8Rng,
    tick: u64,

    alert_keys: HashSet<AlertKey>,
    suggestion_keys: HashSet<(TrainId, Action)>,
}

impl LiveCore {
    pub(crate) fn new(
        route: Route,
        config: LiveConfig,
        detector: ConflictDetector,
        journal: Option<Arc<dyn EventJournal>>,
        commands: Receiver<Command>,
        trains: Vec<Train>,
        mut blocks: Vec<Block>,
    ) -> Self {
        blocks.sort_by(|a, b| a.start_km.total_cmp(&b.start_km));
        let rng = ChaCha8Rng::seed_from_u64(config.jitter_seed);

        let mut core = Self {
            route,
            config,
            detector,
            journal,
            commands,
            trains: trains.into_iter().map(|t| (t.id.clone(), t)).collect(),
            blocks,
            weather: WeatherCondition::Clear,
            alerts: Vec::new(),
            suggestions: Vec::new(),
            holds: BTreeMap::new(),
            rng,
            tick: 0,
            alert_keys: HashSet::new(),
            suggestion_keys: HashSet::new(),
        };
        for train in core.trains.values_mut() {
            train.set_position(core.route.interpolate(train.distance));
            train.next_station = core.route.next_station(train.distance, train.direction).map(str::to_string);
        }
        core.update_occupancy();
        core
    }

    pub(crate) fn snapshot(&self) -> LiveSnapshot {
        LiveSnapshot {
            tick: self.tick,
            trains: self.trains.values().cloned().collect(),
            blocks: self.blocks.clone(),
            alerts: self.alerts.clone(),
            suggestions: self.suggestions.clone(),
            weather: self.weather,
            taken_at: Utc::now(),
        }
    }

    /// Runs one full tick and returns the resulting snapshot.
    pub(crate) fn tick(&mut self) -> LiveSnapshot {
        self.expire_holds();
        self.drain_commands();
        self.apply_jitter();

        let factor = self.weather.live_factor();
        self.advance(factor);
        self.update_occupancy();

        let trains: Vec<&Train> = self.trains.values().collect();
        let alerts = self.detector.detect(&trains, &self.blocks, factor);
        let suggestions = generate_suggestions(trains, &alerts);
        self.alerts = alerts;
        self.suggestions = suggestions;
        self.journal_new_findings();

        self.tick += 1;
        debug!(
            tick = self.tick,
            weather = %self.weather,
            alerts = self.alerts.len(),
            suggestions = self.suggestions.len(),
            "tick"
        );
        self.snapshot()
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::SetWeather(weather) => {
                    debug!(from = %self.weather, to = %weather, "weather changed");
                    self.weather = weather;
                }
                Command::InjectDelay { train, minutes } => self.inject_delay(&train, minutes),
            }
        }
    }

    fn inject_delay(&mut self, id: &TrainId, minutes: f64) {
        let Some(train) = self.trains.get_mut(id) else {
            warn!(train = %id, "delay injected for an unknown train");
            return;
        };

        if self.config.resume_after_delay && minutes > 0.0 {
            let hold_secs = minutes * 60.0;
            self.holds
                .entry(id.clone())
                .and_modify(|hold| hold.remaining_secs = hold.remaining_secs.max(hold_secs))
                .or_insert(Hold {
                    remaining_secs: hold_secs,
                    resume_speed: train.speed,
                    resume_status: train.status,
                });
        }

        train.halt();
        let event = TrainEvent {
            train_no: id.clone(),
            event_type: TrainEventKind::Stop,
            time: Utc::now(),
            block: block_at(&self.blocks, train.distance).map(|b| b.id.clone()),
            speed: 0.0,
            delay: minutes,
        };
        debug!(train = %id, minutes, "train stopped by injected delay");
        self.journal_train_event(event);
    }

    fn expire_holds(&mut self) {
        let step = self.config.tick_seconds;
        let mut resumed = Vec::new();
        for (id, hold) in &mut self.holds {
            hold.remaining_secs -= step;
            if hold.remaining_secs <= 0.0 {
                resumed.push(id.clone());
            }
        }

        for id in resumed {
            let Some(hold) = self.holds.remove(&id) else {
                continue;
            };
            let Some(train) = self.trains.get_mut(&id) else {
                continue;
            };
            train.status = hold.resume_status;
            train.speed = hold.resume_speed;
            let event = TrainEvent {
                train_no: id.clone(),
                event_type: TrainEventKind::Resume,
                time: Utc::now(),
                block: block_at(&self.blocks, train.distance).map(|b| b.id.clone()),
                speed: train.speed,
                delay: 0.0,
            };
            debug!(train = %id, "hold expired, train resumed");
            self.journal_train_event(event);
        }
    }

    fn apply_jitter(&mut self) {
        let jitter = self.config.speed_jitter_kmh;
        if jitter <= 0.0 {
            return;
        }
        let max = self.config.max_speed_kmh;
        for train in self.trains.values_mut() {
            if train.status == TrainStatus::Stopped {
                continue;
            }
            let delta: f64 = self.rng.gen_range(-jitter..=jitter);
            train.speed = (train.speed + delta).clamp(0.0, max);
        }
    }

    /// Moves trains and wraps them at the ends of the route.
    fn advance(&mut self, factor: f64) {
        let length = self.route.length_km();
        let dt_hours = self.config.tick_seconds / 3600.0;

        for train in self.trains.values_mut() {
            let effective = if train.status.is_moving() {
                let limit = block_at(&self.blocks, train.distance).map_or(f64::INFINITY, |b| b.speed_limit);
                (train.speed * factor).min(limit * factor)
            } else {
                0.0
            };

            train.distance += effective * dt_hours * train.direction.sign();
            match train.direction {
                Direction::Eastbound if train.distance > length => train.distance = 0.0,
                Direction::Westbound if train.distance < 0.0 => train.distance = length,
                _ => {}
            }

            train.set_position(self.route.interpolate(train.distance));
            train.next_station = self.route.next_station(train.distance, train.direction).map(str::to_string);
            trace!(train = %train.id, distance = train.distance, effective, "moved");
        }
    }

    fn update_occupancy(&mut self) {
        for block in &mut self.blocks {
            if block.status == BlockStatus::Maintenance {
                continue;
            }
            match self.trains.values().find(|t| block.covers(t.distance)) {
                Some(train) => {
                    block.status = BlockStatus::Occupied;
                    block.active_train_id = Some(train.id.clone());
                }
                None => {
                    block.status = BlockStatus::Free;
                    block.active_train_id = None;
                }
            }
        }
    }

    /// Journals alerts and suggestions that were not present in the previous tick.
    fn journal_new_findings(&mut self) {
        let alert_keys: HashSet<AlertKey> = self.alerts.iter().map(|a| a.key(0)).collect();
        let suggestion_keys: HashSet<(TrainId, Action)> =
            self.suggestions.iter().map(|s| (s.train_id.clone(), s.action)).collect();

        if let Some(journal) = &self.journal {
            for alert in &self.alerts {
                if self.alert_keys.contains(&alert.key(0)) {
                    continue;
                }
                let trains = alert.kind.participants();
                let location = trains
                    .first()
                    .and_then(|id| self.trains.get(id))
                    .map_or_else(String::new, |t| {
                        block_at(&self.blocks, t.distance)
                            .map_or_else(|| format!("{:.2}km", t.distance), |b| b.id.to_string())
                    });
                let log = ConflictLog {
                    conflict_type: alert.category(),
                    trains,
                    location,
                    time: alert.time,
                    severity: alert.severity,
                };
                if let Err(err) = journal.record_conflict(log) {
                    warn!(error = %err, "failed to journal conflict");
                }
            }

            for suggestion in &self.suggestions {
                if self.suggestion_keys.contains(&(suggestion.train_id.clone(), suggestion.action)) {
                    continue;
                }
                let log = SuggestionLog {
                    suggestion_id: suggestion.id,
                    trains: vec![suggestion.train_id.clone()],
                    action: suggestion.action,
                    reason: suggestion.reason.clone(),
                    timestamp: Utc::now(),
                };
                if let Err(err) = journal.record_suggestion(log) {
                    warn!(error = %err, "failed to journal suggestion");
                }
            }
        }

        self.alert_keys = alert_keys;
        self.suggestion_keys = suggestion_keys;
    }

    fn journal_train_event(&self, event: TrainEvent) {
        if let Some(journal) = &self.journal {
            if let Err(err) = journal.record_train_event(event) {
                warn!(error = %err, "failed to journal train event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorConfig;
    use crate::journal::InMemoryJournal;
    use crossbeam_channel::{bounded, Sender};

    fn core_with(config: LiveConfig, trains: Vec<Train>) -> (LiveCore, Sender<Command>) {
        let route = Route::sc_kzj();
        let blocks = route.station_blocks();
        let (tx, rx) = bounded(16);
        let core = LiveCore::new(
            route,
            config,
            ConflictDetector::new(DetectorConfig::default()),
            None,
            rx,
            trains,
            blocks,
        );
        (core, tx)
    }

    fn train(id: &str, distance: f64, speed: f64) -> Train {
        Train::builder(id, id).distance(distance).speed(speed).build().unwrap()
    }

    #[test]
    fn moving_train_advances_by_speed() {
        let (mut core, _tx) = core_with(LiveConfig::default(), vec![train("A", 10.0, 72.0)]);
        let snap = core.tick();
        assert!((snap.trains[0].distance - 10.02).abs() < 1e-9);
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.trains[0].next_station.as_deref(), Some("CHZ"));
    }

    #[test]
    fn delayed_and_stopped_trains_hold_position() {
        let mut delayed = train("D", 10.0, 60.0);
        delayed.status = TrainStatus::Delayed;
        let mut stopped = train("S", 30.0, 60.0);
        stopped.status = TrainStatus::Stopped;
        let (mut core, _tx) = core_with(LiveConfig::default(), vec![delayed, stopped]);
        let snap = core.tick();
        assert_eq!(snap.trains[0].distance, 10.0);
        assert_eq!(snap.trains[1].distance, 30.0);
    }

    #[test]
    fn eastbound_wraps_to_origin_and_westbound_to_end() {
        let east = train("E", 136.99, 120.0);
        let mut west = train("W", 0.01, 120.0);
        west.direction = Direction::Westbound;
        let (mut core, _tx) = core_with(LiveConfig::default(), vec![east, west]);
        let snap = core.tick();
        assert_eq!(snap.train(&TrainId::new("E")).unwrap().distance, 0.0);
        assert_eq!(snap.train(&TrainId::new("W")).unwrap().distance, 137.0);
        assert_eq!(snap.train(&TrainId::new("W")).unwrap().position(), Route::sc_kzj().interpolate(137.0));
    }

    #[test]
    fn block_limit_caps_motion() {
        let (mut core, _tx) = core_with(LiveConfig::default(), vec![train("A", 10.0, 3600.0)]);
        let snap = core.tick();
        assert!((snap.trains[0].distance - (10.0 + 100.0 / 3600.0)).abs() < 1e-9);
    }

    #[test]
    fn weather_command_applies_on_next_tick() {
        let (mut core, tx) = core_with(LiveConfig::default(), vec![train("A", 10.0, 72.0)]);
        tx.send(Command::SetWeather(WeatherCondition::Storm)).unwrap();
        let snap = core.tick();
        assert_eq!(snap.weather, WeatherCondition::Storm);
        assert!((snap.trains[0].distance - 10.01).abs() < 1e-9);
    }

    #[test]
    fn occupancy_follows_trains() {
        let (mut core, _tx) = core_with(LiveConfig::default(), vec![train("A", 8.0, 0.0)]);
        let snap = core.tick();
        let occupied: Vec<&Block> = snap.blocks.iter().filter(|b| b.status == BlockStatus::Occupied).collect();
        assert_eq!(occupied.len(), 1);
        assert_eq!(occupied[0].id.as_str(), "BLK-MJF-CHZ");
        assert_eq!(occupied[0].active_train_id, Some(TrainId::new("A")));
    }

    #[test]
    fn injected_delay_stops_and_later_resumes() {
        let config = LiveConfig {
            tick_seconds: 30.0,
            resume_after_delay: true,
            ..LiveConfig::default()
        };
        let (mut core, tx) = core_with(config, vec![train("A", 10.0, 80.0)]);
        tx.send(Command::InjectDelay {
            train: TrainId::new("A"),
            minutes: 1.0,
        })
        .unwrap();

        let snap = core.tick();
        assert_eq!(snap.trains[0].status, TrainStatus::Stopped);
        assert_eq!(snap.trains[0].speed, 0.0);

        core.tick();
        let snap = core.tick();
        assert_eq!(snap.trains[0].status, TrainStatus::OnTime);
        assert_eq!(snap.trains[0].speed, 80.0);
    }

    #[test]
    fn injected_delay_without_resume_is_a_full_stop() {
        let (mut core, tx) = core_with(LiveConfig::default(), vec![train("A", 10.0, 80.0)]);
        tx.send(Command::InjectDelay {
            train: TrainId::new("A"),
            minutes: 0.01,
        })
        .unwrap();
        for _ in 0..10 {
            core.tick();
        }
        assert_eq!(core.snapshot().trains[0].status, TrainStatus::Stopped);
    }

    #[test]
    fn jitter_is_seeded_and_bounded() {
        let config = LiveConfig {
            speed_jitter_kmh: 2.0,
            jitter_seed: 7,
            ..LiveConfig::default()
        };
        let (mut a, _ta) = core_with(config.clone(), vec![train("A", 10.0, 119.5)]);
        let (mut b, _tb) = core_with(config, vec![train("A", 10.0, 119.5)]);
        for _ in 0..50 {
            let (sa, sb) = (a.tick(), b.tick());
            assert_eq!(sa.trains[0].speed, sb.trains[0].speed);
            assert!((0.0..=120.0).contains(&sa.trains[0].speed));
        }
    }

    #[test]
    fn journal_records_only_new_findings() {
        let route = Route::sc_kzj();
        let blocks = route.station_blocks();
        let journal = Arc::new(InMemoryJournal::new());
        let (_tx, rx) = bounded(1);
        let mut a = train("A", 10.0, 0.0);
        a.status = TrainStatus::Delayed;
        let b = train("B", 10.5, 0.0);
        let mut core = LiveCore::new(
            route,
            LiveConfig::default(),
            ConflictDetector::default(),
            Some(journal.clone() as Arc<dyn EventJournal>),
            rx,
            vec![a, b],
            blocks,
        );

        core.tick();
        core.tick();
        let conflicts = journal.conflicts().unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].location, "BLK-MJF-CHZ");
        assert_eq!(journal.suggestions().unwrap().len(), 1);
    }
}
