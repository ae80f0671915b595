//! Corridor configuration.
//!
//! Every section has defaults, so an empty file is a valid configuration:
//!
//! ```toml
//! [live]
//! tick_interval_ms = 1000
//! speed_jitter_kmh = 2.0
//!
//! [detector]
//! safe_distance_km = 2.0
//!
//! [what_if]
//! step_seconds = 10
//! max_horizon_minutes = 1440
//!
//! [publisher]
//! stream_capacity = 64
//!
//! [runtime]
//! what_if_workers = 2
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detector::DetectorConfig;
use crate::error::{ConfigError, CorridorResult};
use crate::live::LiveConfig;
use crate::publish::PublisherConfig;
use crate::runtime::RuntimeConfig;
use crate::simulation::WhatIfConfig;

/// All tunables, grouped by component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorridorConfig {
    pub live: LiveConfig,
    pub detector: DetectorConfig,
    pub what_if: WhatIfConfig,
    pub publisher: PublisherConfig,
    pub runtime: RuntimeConfig,
}

impl CorridorConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> CorridorResult<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> CorridorResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Validates every section.
    pub fn validate(&self) -> CorridorResult<()> {
        self.live.validate()?;
        self.detector.validate()?;
        self.what_if.validate()?;
        self.publisher.validate()?;
        self.runtime.validate()?;
        Ok(())
    }
}
