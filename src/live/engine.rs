//! The live tick engine.
//!
//! One dedicated thread per running engine. The only suspension point is the
//! tick boundary: the thread waits on a crossbeam `tick` receiver selected
//! together with a stop channel. The authoritative state sits behind a mutex
//! that only a tick holds; readers see the `Arc<LiveSnapshot>` swapped in when
//! a tick completes, so a partially computed tick is never observable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender, TrySendError};
use tracing::{info, warn};

use crate::block::Block;
use crate::config::CorridorConfig;
use crate::detector::ConflictDetector;
use crate::error::{poisoned, CorridorError, CorridorResult, ExecutionError, ValidationError};
use crate::journal::EventJournal;
use crate::publish::{Publisher, SnapshotStream, StateUpdate};
use crate::route::Route;
use crate::train::{Train, TrainId};
use crate::weather::WeatherCondition;

use super::command::Command;
use super::config::LiveConfig;
use super::seed::default_fleet;
use super::state::{LiveCore, LiveSnapshot};

/// Live engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
}

struct Shared {
    core: Mutex<LiveCore>,
    snapshot: RwLock<Arc<LiveSnapshot>>,
    publisher: Arc<Publisher>,
}

impl Shared {
    /// Runs one tick. The core lock is held until the snapshot is swapped in
    /// and the update published, so concurrent ticks publish in tick order and
    /// a subscriber never sees a tick newer than `snapshot()`.
    fn run_tick(&self) -> CorridorResult<Arc<LiveSnapshot>> {
        let mut core = self.core.lock().map_err(|_| poisoned("live.core"))?;
        let snapshot = Arc::new(core.tick());

        {
            let mut current = self.snapshot.write().map_err(|_| poisoned("live.snapshot"))?;
            *current = Arc::clone(&snapshot);
        }

        self.publisher.publish(StateUpdate::new(
            snapshot.tick,
            snapshot.trains.clone(),
            snapshot.alerts.clone(),
            snapshot.suggestions.clone(),
            snapshot.weather,
        ));
        drop(core);
        Ok(snapshot)
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Builder for [`LiveEngine`].
///
/// Unset parts fall back to the SC-KZJ corridor, its station blocks and the
/// default fleet.
#[derive(Default)]
pub struct LiveEngineBuilder {
    config: LiveConfig,
    route: Option<Route>,
    trains: Option<Vec<Train>>,
    blocks: Option<Vec<Block>>,
    detector: ConflictDetector,
    publisher: Option<Arc<Publisher>>,
    journal: Option<Arc<dyn EventJournal>>,
}

impl LiveEngineBuilder {
    #[must_use]
    pub fn config(mut self, config: LiveConfig) -> Self {
        self.config = config;
        self
    }

    /// Applies the live, detector and publisher sections of a full configuration.
    #[must_use]
    pub fn corridor_config(mut self, config: &CorridorConfig) -> Self {
        self.config = config.live.clone();
        self.detector = ConflictDetector::new(config.detector.clone());
        self.publisher = Some(Arc::new(Publisher::new(config.publisher.clone())));
        self
    }

    #[must_use]
    pub fn route(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }

    #[must_use]
    pub fn trains(mut self, trains: Vec<Train>) -> Self {
        self.trains = Some(trains);
        self
    }

    #[must_use]
    pub fn blocks(mut self, blocks: Vec<Block>) -> Self {
        self.blocks = Some(blocks);
        self
    }

    #[must_use]
    pub fn detector(mut self, detector: ConflictDetector) -> Self {
        self.detector = detector;
        self
    }

    #[must_use]
    pub fn publisher(mut self, publisher: Arc<Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    #[must_use]
    pub fn journal(mut self, journal: Arc<dyn EventJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Validates the inputs and creates a stopped engine.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid configuration, a block with an
    /// inverted extent, or a train with a negative speed or a position off the
    /// route.
    pub fn build(self) -> CorridorResult<LiveEngine> {
        self.config.validate()?;
        self.detector.config().validate()?;

        let route = self.route.unwrap_or_else(Route::sc_kzj);
        let blocks = self.blocks.unwrap_or_else(|| route.station_blocks());
        let trains = self.trains.unwrap_or_else(|| default_fleet(&route));

        for block in &blocks {
            if !(block.start_km < block.end_km) {
                return Err(ValidationError::InvalidBlockExtent {
                    id: block.id.to_string(),
                    start_km: block.start_km,
                    end_km: block.end_km,
                }
                .into());
            }
        }
        let length = route.length_km();
        for train in &trains {
            if !train.speed.is_finite() || train.speed < 0.0 {
                return Err(ValidationError::InvalidSpeed { value: train.speed }.into());
            }
            if !(0.0..=length).contains(&train.distance) {
                return Err(ValidationError::InvalidConfig {
                    reason: format!(
                        "train {} at {} km is outside the route (0..={length} km)",
                        train.id, train.distance
                    ),
                }
                .into());
            }
        }

        let (command_tx, command_rx) = bounded(self.config.command_queue_capacity);
        let interval = Duration::from_millis(self.config.tick_interval_ms);
        let core = LiveCore::new(
            route.clone(),
            self.config,
            self.detector,
            self.journal,
            command_rx,
            trains,
            blocks,
        );
        let snapshot = Arc::new(core.snapshot());

        Ok(LiveEngine {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                snapshot: RwLock::new(snapshot),
                publisher: self.publisher.unwrap_or_default(),
            }),
            route,
            command_tx,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        })
    }
}

/// The continuously running corridor simulation.
///
/// Created stopped; [`LiveEngine::start`] spawns the tick thread and
/// [`LiveEngine::stop`] joins it. Commands issued while running take effect at
/// the start of the next tick.
pub struct LiveEngine {
    shared: Arc<Shared>,
    route: Route,
    command_tx: Sender<Command>,
    interval: Duration,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for LiveEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveEngine")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl LiveEngine {
    #[must_use]
    pub fn builder() -> LiveEngineBuilder {
        LiveEngineBuilder::default()
    }

    /// Engine over the default corridor and fleet.
    pub fn with_defaults(config: &CorridorConfig) -> CorridorResult<Self> {
        Self::builder().corridor_config(config).build()
    }

    /// Route the engine runs on.
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        if self.is_running() {
            EngineState::Running
        } else {
            EngineState::Stopped
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts the tick thread. Idempotent.
    pub fn start(&self) -> CorridorResult<()> {
        let mut worker = self.worker.lock().map_err(|_| poisoned("live.worker"))?;
        if worker.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        let name = "corridor-live".to_string();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if let Err(err) = shared.run_tick() {
                                warn!(error = %err, "live tick failed");
                            }
                        }
                    }
                }
            })
            .map_err(|err| ExecutionError::Spawn {
                name,
                reason: err.to_string(),
            })?;

        *worker = Some(Worker { stop_tx, handle });
        self.running.store(true, Ordering::Release);
        info!(interval_ms = self.interval.as_millis() as u64, "live engine started");
        Ok(())
    }

    /// Stops the tick thread and waits for it to exit. Idempotent.
    pub fn stop(&self) -> CorridorResult<()> {
        let worker = self.worker.lock().map_err(|_| poisoned("live.worker"))?.take();
        let Some(worker) = worker else {
            return Ok(());
        };

        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            warn!("live tick thread panicked");
        }
        self.running.store(false, Ordering::Release);
        info!("live engine stopped");
        Ok(())
    }

    /// Runs one tick on the calling thread.
    pub fn tick_once(&self) -> CorridorResult<Arc<LiveSnapshot>> {
        self.shared.run_tick()
    }

    /// Latest completed snapshot.
    pub fn snapshot(&self) -> CorridorResult<Arc<LiveSnapshot>> {
        let current = self.shared.snapshot.read().map_err(|_| poisoned("live.snapshot"))?;
        Ok(Arc::clone(&current))
    }

    pub fn trains(&self) -> CorridorResult<Vec<Train>> {
        Ok(self.snapshot()?.trains.clone())
    }

    pub fn blocks(&self) -> CorridorResult<Vec<Block>> {
        Ok(self.snapshot()?.blocks.clone())
    }

    pub fn alerts(&self) -> CorridorResult<Vec<crate::alert::Alert>> {
        Ok(self.snapshot()?.alerts.clone())
    }

    pub fn suggestions(&self) -> CorridorResult<Vec<crate::suggestion::Suggestion>> {
        Ok(self.snapshot()?.suggestions.clone())
    }

    /// Weather as of the latest tick. A queued change shows up after the next tick.
    pub fn weather(&self) -> CorridorResult<WeatherCondition> {
        Ok(self.snapshot()?.weather)
    }

    /// Queues a weather change for the next tick.
    pub fn set_weather(&self, weather: WeatherCondition) -> CorridorResult<()> {
        self.send(Command::SetWeather(weather))
    }

    /// Queues an immediate stop for `train`.
    ///
    /// # Errors
    ///
    /// `ExecutionError::TrainNotFound` for an unknown train and
    /// `ValidationError::InvalidDelay` for a negative or non-finite delay.
    pub fn inject_delay(&self, train: &TrainId, minutes: f64) -> CorridorResult<()> {
        if !minutes.is_finite() || minutes < 0.0 {
            return Err(ValidationError::InvalidDelay { value: minutes }.into());
        }
        if self.snapshot()?.train(train).is_none() {
            return Err(ExecutionError::TrainNotFound { id: train.clone() }.into());
        }
        self.send(Command::InjectDelay {
            train: train.clone(),
            minutes,
        })
    }

    /// Subscribe to per-tick state updates.
    pub fn subscribe(&self) -> CorridorResult<SnapshotStream> {
        self.shared.publisher.subscribe()
    }

    #[must_use]
    pub fn publisher(&self) -> &Arc<Publisher> {
        &self.shared.publisher
    }

    fn send(&self, command: Command) -> CorridorResult<()> {
        self.command_tx.try_send(command).map_err(|err| match err {
            TrySendError::Full(_) => CorridorError::Execution(ExecutionError::QueueFull {
                path: "live_commands".to_string(),
                capacity: self.command_tx.capacity().unwrap_or_default(),
            }),
            TrySendError::Disconnected(_) => CorridorError::Execution(ExecutionError::Disconnected {
                path: "live_commands".to_string(),
            }),
        })
    }
}

impl Drop for LiveEngine {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "failed to stop live engine on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::TrainStatus;

    fn fast_engine() -> LiveEngine {
        LiveEngine::builder()
            .config(LiveConfig {
                tick_interval_ms: 5,
                ..LiveConfig::default()
            })
            .build()
            .unwrap()
    }

    #[test]
    fn starts_stopped_with_seeded_fleet() {
        let engine = fast_engine();
        assert_eq!(engine.state(), EngineState::Stopped);
        let snap = engine.snapshot().unwrap();
        assert_eq!(snap.tick, 0);
        assert_eq!(snap.trains.len(), 3);
        assert_eq!(snap.blocks.len(), 8);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let engine = fast_engine();
        engine.start().unwrap();
        engine.start().unwrap();
        assert!(engine.is_running());
        thread::sleep(Duration::from_millis(50));
        engine.stop().unwrap();
        engine.stop().unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(engine.snapshot().unwrap().tick > 0);
    }

    #[test]
    fn inject_delay_validates_input() {
        let engine = fast_engine();
        let err = engine.inject_delay(&TrainId::new("00000"), 5.0).unwrap_err();
        assert!(matches!(err, CorridorError::Execution(ExecutionError::TrainNotFound { .. })));
        assert!(engine.inject_delay(&TrainId::new("12723"), -1.0).unwrap_err().is_validation());

        engine.inject_delay(&TrainId::new("12723"), 5.0).unwrap();
        let snap = engine.tick_once().unwrap();
        let train = snap.train(&TrainId::new("12723")).unwrap();
        assert_eq!(train.status, TrainStatus::Stopped);
        assert_eq!(train.speed, 0.0);
    }

    #[test]
    fn ticks_are_published() {
        let engine = fast_engine();
        let stream = engine.subscribe().unwrap();
        engine.set_weather(WeatherCondition::Fog).unwrap();
        engine.tick_once().unwrap();
        let update = stream.try_recv().unwrap().unwrap();
        assert_eq!(update.tick, 1);
        assert_eq!(update.weather, WeatherCondition::Fog);
        assert_eq!(engine.weather().unwrap(), WeatherCondition::Fog);
    }

    #[test]
    fn rejects_trains_off_the_route() {
        let train = Train::builder("X", "X").distance(500.0).build().unwrap();
        let err = LiveEngine::builder().trains(vec![train]).build().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn concurrent_ticks_publish_in_tick_order() {
        use crate::publish::PublisherConfig;

        let engine = LiveEngine::builder()
            .config(LiveConfig {
                tick_interval_ms: 1,
                ..LiveConfig::default()
            })
            .publisher(Arc::new(Publisher::new(PublisherConfig { stream_capacity: 4096 })))
            .build()
            .unwrap();
        let stream = engine.subscribe().unwrap();
        engine.start().unwrap();

        let mut last_tick = 0;
        for _ in 0..200 {
            engine.tick_once().unwrap();
            while let Some(update) = stream.try_recv().unwrap() {
                assert!(update.tick > last_tick, "tick {} after {last_tick}", update.tick);
                assert!(engine.snapshot().unwrap().tick >= update.tick);
                last_tick = update.tick;
            }
        }
        engine.stop().unwrap();
        assert!(last_tick >= 200);
    }
}
