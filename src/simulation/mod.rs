//! What-if simulation.
//!
//! A what-if run forks a one-time snapshot of the corridor into a private
//! sandbox, applies a scenario's modifiers and fast-forwards a bounded
//! horizon. Nothing in this module holds a reference to live engine state.

pub mod cancel;
pub mod constraints;
pub mod result;
pub mod sandbox;

pub use cancel::CancellationToken;
pub use constraints::WhatIfConfig;
pub use result::{ScenarioRunId, SimulationMetrics, SimulationResult};
pub use sandbox::{SignalAspect, WhatIfEngine};
