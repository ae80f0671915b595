//! Global weather condition and its speed factors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Weather condition applied uniformly to the whole corridor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherCondition {
    #[default]
    #[serde(alias = "clear")]
    Clear,
    #[serde(alias = "rain")]
    Rain,
    #[serde(alias = "fog")]
    Fog,
    #[serde(alias = "storm")]
    Storm,
}

impl WeatherCondition {
    /// All conditions, mildest first.
    pub const ALL: [Self; 4] = [Self::Clear, Self::Rain, Self::Fog, Self::Storm];

    /// Speed multiplier used by the live engine each tick.
    #[must_use]
    pub const fn live_factor(self) -> f64 {
        match self {
            Self::Clear => 1.0,
            Self::Rain => 0.8,
            Self::Fog => 0.7,
            Self::Storm => 0.5,
        }
    }

    /// Speed multiplier applied once to base speeds when a scenario is loaded.
    #[must_use]
    pub const fn scenario_factor(self) -> f64 {
        match self {
            Self::Clear => 1.0,
            Self::Rain => 0.85,
            Self::Fog => 0.60,
            Self::Storm => 0.40,
        }
    }

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Rain => "rain",
            Self::Fog => "fog",
            Self::Storm => "storm",
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeatherCondition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear" => Ok(Self::Clear),
            "rain" => Ok(Self::Rain),
            "fog" => Ok(Self::Fog),
            "storm" => Ok(Self::Storm),
            _ => Err(ValidationError::UnknownWeather { value: s.to_string() }),
        }
    }
}
