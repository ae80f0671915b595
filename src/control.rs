//! Command surface held by an API layer.
//!
//! A [`ControlSurface`] is constructed explicitly and owns the what-if worker
//! pool. The live engine is attached after construction; until then every
//! command and query fails with `ExecutionError::EngineUnavailable`.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, info};

use crate::alert::Alert;
use crate::block::Block;
use crate::config::CorridorConfig;
use crate::error::{poisoned, CorridorResult, ExecutionError};
use crate::live::{LiveEngine, LiveSnapshot};
use crate::publish::SnapshotStream;
use crate::runtime::{WhatIfHandle, WhatIfRuntime};
use crate::scenario::ScenarioConfig;
use crate::simulation::{SimulationResult, WhatIfEngine};
use crate::suggestion::Suggestion;
use crate::train::{Train, TrainId};
use crate::weather::WeatherCondition;

/// Entry point for start/stop, commands, what-if runs and queries.
#[derive(Debug)]
pub struct ControlSurface {
    config: CorridorConfig,
    engine: RwLock<Option<Arc<LiveEngine>>>,
    runtime: WhatIfRuntime,
}

impl ControlSurface {
    /// Validates `config` and starts the what-if workers.
    pub fn new(config: CorridorConfig) -> CorridorResult<Self> {
        config.validate()?;
        let runtime = WhatIfRuntime::start(&config.runtime)?;
        Ok(Self {
            config,
            engine: RwLock::new(None),
            runtime,
        })
    }

    #[must_use]
    pub fn config(&self) -> &CorridorConfig {
        &self.config
    }

    /// Attaches a live engine, replacing and stopping any previous one.
    pub fn attach(&self, engine: LiveEngine) -> CorridorResult<Arc<LiveEngine>> {
        let engine = Arc::new(engine);
        let previous = {
            let mut slot = self.engine.write().map_err(|_| poisoned("control.engine"))?;
            slot.replace(Arc::clone(&engine))
        };
        if let Some(previous) = previous {
            previous.stop()?;
        }
        info!("live engine attached");
        Ok(engine)
    }

    /// Detaches and stops the current engine, if any.
    pub fn detach(&self) -> CorridorResult<Option<Arc<LiveEngine>>> {
        let previous = self.engine.write().map_err(|_| poisoned("control.engine"))?.take();
        if let Some(engine) = &previous {
            engine.stop()?;
        }
        Ok(previous)
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.engine.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// The attached engine.
    pub fn engine(&self) -> CorridorResult<Arc<LiveEngine>> {
        let slot = self.engine.read().map_err(|_| poisoned("control.engine"))?;
        slot.clone().ok_or_else(|| ExecutionError::EngineUnavailable.into())
    }

    pub fn start(&self) -> CorridorResult<()> {
        self.engine()?.start()
    }

    pub fn stop(&self) -> CorridorResult<()> {
        self.engine()?.stop()
    }

    /// Parses a weather name (`clear`, `rain`, `fog`, `storm`) and queues it.
    pub fn set_weather(&self, weather: &str) -> CorridorResult<()> {
        let engine = self.engine()?;
        let weather: WeatherCondition = weather.parse()?;
        engine.set_weather(weather)
    }

    pub fn set_weather_condition(&self, weather: WeatherCondition) -> CorridorResult<()> {
        self.engine()?.set_weather(weather)
    }

    pub fn inject_delay(&self, train: &TrainId, minutes: f64) -> CorridorResult<()> {
        self.engine()?.inject_delay(train, minutes)
    }

    /// Queues a what-if run over a copy of the latest live snapshot.
    ///
    /// A scenario horizon of 0 selects `what_if.default_horizon_minutes`.
    ///
    /// # Errors
    ///
    /// Fails with a validation error for an out-of-range horizon, and with
    /// `ExecutionError::QueueFull` when the worker queue is saturated.
    pub fn submit_what_if(&self, scenario: &ScenarioConfig) -> CorridorResult<WhatIfHandle> {
        let engine = self.engine()?;
        let horizon = self.horizon_for(scenario);
        self.config.what_if.validate_horizon(horizon)?;

        let snapshot = engine.snapshot()?;
        let mut sandbox = WhatIfEngine::new(&snapshot.trains, &snapshot.blocks)
            .with_route(engine.route().clone())
            .with_config(self.config.what_if.clone())
            .with_detector(self.config.detector.clone());
        sandbox.apply_scenario(scenario);

        debug!(scenario = %scenario.name, horizon_minutes = horizon, tick = snapshot.tick, "what-if submitted");
        self.runtime.submit(sandbox, horizon)
    }

    /// Runs a what-if to completion, honouring `what_if.timeout_ms`.
    pub fn run_what_if(&self, scenario: &ScenarioConfig) -> CorridorResult<SimulationResult> {
        let handle = self.submit_what_if(scenario)?;
        match self.config.what_if.timeout_ms {
            Some(ms) => handle.join_timeout(Duration::from_millis(ms)),
            None => handle.join(),
        }
    }

    fn horizon_for(&self, scenario: &ScenarioConfig) -> u32 {
        match scenario.simulation_horizon_minutes {
            0 => self.config.what_if.default_horizon_minutes,
            minutes => minutes,
        }
    }

    pub fn subscribe(&self) -> CorridorResult<SnapshotStream> {
        self.engine()?.subscribe()
    }

    pub fn snapshot(&self) -> CorridorResult<Arc<LiveSnapshot>> {
        self.engine()?.snapshot()
    }

    pub fn trains(&self) -> CorridorResult<Vec<Train>> {
        self.engine()?.trains()
    }

    pub fn blocks(&self) -> CorridorResult<Vec<Block>> {
        self.engine()?.blocks()
    }

    pub fn alerts(&self) -> CorridorResult<Vec<Alert>> {
        self.engine()?.alerts()
    }

    pub fn suggestions(&self) -> CorridorResult<Vec<Suggestion>> {
        self.engine()?.suggestions()
    }

    pub fn weather(&self) -> CorridorResult<WeatherCondition> {
        self.engine()?.weather()
    }
}
