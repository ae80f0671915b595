//! # corridor - Rail corridor simulation
//!
//! Simulates train movement along a single rail corridor in real time,
//! detects safety conflicts, suggests operator actions and runs isolated
//! what-if scenarios over a copy of the live state.
//!
//! ## Core Concepts
//!
//! - **Route**: an ordered polyline of stations; positions are km from the origin
//! - **Block**: a contiguous km segment with a speed limit and occupancy status
//! - **Live engine**: a background tick loop that moves trains, detects alerts
//!   and publishes a state update every tick
//! - **What-if engine**: a sandboxed, fixed-step simulation of a scenario that
//!   never touches the live state
//!
//! ## Usage
//!
//! ```rust,ignore
//! use corridor::{ControlSurface, CorridorConfig, LiveEngine, ScenarioConfig, ScenarioModifier};
//!
//! let config = CorridorConfig::load("corridor.toml")?;
//! let control = ControlSurface::new(config.clone())?;
//! control.attach(LiveEngine::with_defaults(&config)?)?;
//! control.start()?;
//!
//! let scenario = ScenarioConfig::new(
//!     "ghat closure",
//!     ScenarioModifier::builder().maintenance("BLK-GT-BN").build(),
//! );
//! let result = control.run_what_if(&scenario)?;
//! println!("{} predicted conflicts", result.predicted_conflicts.len());
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Domain types
pub mod alert;
pub mod block;
pub mod error;
pub mod route;
pub mod scenario;
pub mod suggestion;
pub mod train;
pub mod weather;

// Detection and advice
pub mod advisor;
pub mod detector;

// Engines
pub mod live;
pub mod runtime;
pub mod simulation;

// Surfaces
pub mod config;
pub mod control;
pub mod journal;
pub mod publish;

pub use alert::{Alert, AlertCategory, AlertId, AlertKey, AlertKind, Severity};
pub use block::{block_at, Block, BlockId, BlockStatus};
pub use error::{
    ConfigError, CorridorError, CorridorResult, ExecutionError, JournalError, ScoringError, ValidationError,
};
pub use route::{GeoPoint, Route, Waypoint};
pub use scenario::{ScenarioConfig, ScenarioModifier, ScenarioModifierBuilder};
pub use suggestion::{Action, RankedAction, Suggestion, SuggestionId};
pub use train::{Direction, Train, TrainBuilder, TrainId, TrainStatus};
pub use weather::WeatherCondition;

pub use advisor::generate_suggestions;
pub use detector::{ConflictDetector, DetectorConfig, RiskScorer};

pub use config::CorridorConfig;
pub use control::ControlSurface;
pub use journal::{EventJournal, InMemoryJournal};
pub use live::{EngineState, LiveConfig, LiveEngine, LiveEngineBuilder, LiveSnapshot};
pub use publish::{Publisher, PublisherConfig, SnapshotStream, StateUpdate};
pub use runtime::{RuntimeConfig, WhatIfHandle, WhatIfRuntime};
pub use simulation::{CancellationToken, SignalAspect, SimulationResult, WhatIfConfig, WhatIfEngine};
