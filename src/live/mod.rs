//! Live corridor simulation.
//!
//! The live engine owns the authoritative train and block state for the
//! lifetime of the process. Each tick drains queued commands, moves trains,
//! runs conflict detection and the advisor, then publishes a snapshot.

mod command;
pub mod config;
pub mod engine;
pub mod seed;
pub mod state;

pub use config::LiveConfig;
pub use engine::{EngineState, LiveEngine, LiveEngineBuilder};
pub use seed::default_fleet;
pub use state::LiveSnapshot;
