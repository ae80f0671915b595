//! Error types for the corridor simulation.
//!
//! All errors are strongly typed using thiserror so callers can pattern match
//! on the specific condition instead of parsing messages.

use thiserror::Error;

use crate::train::TrainId;

/// Validation errors that occur while checking inputs and configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid route: {reason}")]
    InvalidRoute {
        reason: String,
    },

    #[error("Invalid block '{id}': start_km ({start_km}) must be below end_km ({end_km})")]
    InvalidBlockExtent {
        id: String,
        start_km: f64,
        end_km: f64,
    },

    #[error("Unknown weather condition '{value}' (expected clear, rain, fog or storm)")]
    UnknownWeather {
        value: String,
    },

    #[error("Speed {value} km/h is invalid: speed must be finite and non-negative")]
    InvalidSpeed {
        value: f64,
    },

    #[error("Delay of {value} minutes is invalid: delay must be finite and non-negative")]
    InvalidDelay {
        value: f64,
    },

    #[error("Invalid what-if constraints: {reason}")]
    InvalidWhatIfConstraints {
        reason: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Execution errors that occur while the engines are running.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Simulation engine unavailable: no live engine has been attached")]
    EngineUnavailable,

    #[error("Train not found: {id}")]
    TrainNotFound {
        id: TrainId,
    },

    #[error("Worker queue full on {path} (capacity {capacity})")]
    QueueFull {
        path: String,
        capacity: usize,
    },

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("What-if run cancelled after {completed_steps} steps")]
    Cancelled {
        completed_steps: u64,
    },

    #[error("Failed to spawn thread '{name}': {reason}")]
    Spawn {
        name: String,
        reason: String,
    },

    #[error("Poisoned lock: {context}")]
    Poisoned {
        context: String,
    },
}

/// Failures reported by an injected risk-scoring capability.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Risk scorer unavailable: {reason}")]
    Unavailable {
        reason: String,
    },

    #[error("Risk scorer returned invalid probability {value}")]
    InvalidProbability {
        value: f64,
    },

    #[error("Risk scorer failed: {message}")]
    Backend {
        message: String,
    },
}

/// Failures reported by an event journal sink.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Journal backend error: {0}")]
    Backend(String),

    #[error("Journal serialization error: {0}")]
    Serialization(String),
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level error type for the corridor simulation.
#[derive(Debug, Error)]
pub enum CorridorError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CorridorError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if the caller reached the command surface before an engine existed.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::EngineUnavailable))
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Config(_) => false,
            Self::Execution(e) => matches!(
                e,
                ExecutionError::QueueFull { .. }
                    | ExecutionError::Timeout { .. }
                    | ExecutionError::Disconnected { .. }
            ),
            Self::Scoring(e) => matches!(e, ScoringError::Unavailable { .. }),
            Self::Journal(e) => matches!(e, JournalError::Backend(_)),
        }
    }
}

/// Result type alias for corridor operations.
pub type CorridorResult<T> = Result<T, CorridorError>;

pub(crate) fn poisoned(context: &str) -> CorridorError {
    CorridorError::Execution(ExecutionError::Poisoned {
        context: context.to_string(),
    })
}
