//! Alerts raised by conflict detection.
//!
//! Alerts are recomputed from scratch on every detection pass. Each alert
//! carries a structured [`AlertKind`] naming its participants, so identity
//! never depends on the formatted message.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::block::BlockId;
use crate::train::TrainId;

/// Unique identifier for an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(Uuid);

impl AlertId {
    /// Creates a new random alert ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    /// Also reported as MINOR.
    #[serde(alias = "MINOR")]
    Warning,
    Major,
    Critical,
}

/// Detection rule that produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    RearEnd,
    Overspeed,
    PredictedConflict,
}

/// Structured alert detail.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertKind {
    /// Two adjacent trains closer than the safe distance.
    RearEnd {
        /// Train further along the route.
        leading: TrainId,
        /// Train closer to the origin.
        trailing: TrainId,
        gap_km: f64,
    },

    /// A train running above its block's limit.
    Overspeed {
        train: TrainId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        block: Option<BlockId>,
        speed: f64,
        limit: f64,
    },

    /// Pairwise conflict probability from the risk scorer.
    PredictedConflict {
        first: TrainId,
        second: TrainId,
        probability: f64,
    },
}

impl AlertKind {
    #[must_use]
    pub const fn category(&self) -> AlertCategory {
        match self {
            Self::RearEnd { .. } => AlertCategory::RearEnd,
            Self::Overspeed { .. } => AlertCategory::Overspeed,
            Self::PredictedConflict { .. } => AlertCategory::PredictedConflict,
        }
    }

    /// Trains involved, in a stable sorted order.
    #[must_use]
    pub fn participants(&self) -> Vec<TrainId> {
        let mut ids = match self {
            Self::RearEnd { leading, trailing, .. } => vec![leading.clone(), trailing.clone()],
            Self::Overspeed { train, .. } => vec![train.clone()],
            Self::PredictedConflict { first, second, .. } => vec![first.clone(), second.clone()],
        };
        ids.sort();
        ids
    }
}

/// A detection result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub severity: Severity,
    pub kind: AlertKind,
    /// Human-readable description.
    pub message: String,
    /// Emission time.
    pub time: DateTime<Utc>,
}

impl Alert {
    /// Creates an alert stamped with the current time.
    #[must_use]
    pub fn new(severity: Severity, kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            id: AlertId::new(),
            severity,
            kind,
            message: message.into(),
            time: Utc::now(),
        }
    }

    #[must_use]
    pub const fn category(&self) -> AlertCategory {
        self.kind.category()
    }

    /// Structured identity of this alert within a time bucket.
    #[must_use]
    pub fn key(&self, bucket: u64) -> AlertKey {
        AlertKey {
            category: self.category(),
            participants: self.kind.participants(),
            bucket,
        }
    }
}

/// Identity used to deduplicate alerts: rule, trains involved and time bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlertKey {
    pub category: AlertCategory,
    pub participants: Vec<TrainId>,
    pub bucket: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rear_end(gap_km: f64) -> Alert {
        Alert::new(
            Severity::Major,
            AlertKind::RearEnd {
                leading: TrainId::new("B"),
                trailing: TrainId::new("A"),
                gap_km,
            },
            format!("Collision Risk: A and B are too close ({gap_km:.2}km)"),
        )
    }

    #[test]
    fn key_ignores_message_and_measurements() {
        let a = rear_end(1.5);
        let b = rear_end(1.2);
        assert_ne!(a.message, b.message);
        assert_eq!(a.key(3), b.key(3));
        assert_ne!(a.key(3), b.key(4));
    }

    #[test]
    fn participants_are_sorted() {
        let kind = AlertKind::PredictedConflict {
            first: TrainId::new("Z"),
            second: TrainId::new("A"),
            probability: 0.7,
        };
        assert_eq!(kind.participants(), vec![TrainId::new("A"), TrainId::new("Z")]);
    }

    #[test]
    fn severity_orders_and_accepts_minor() {
        assert!(Severity::Critical > Severity::Major);
        assert!(Severity::Major > Severity::Warning);
        let s: Severity = serde_json::from_str("\"MINOR\"").unwrap();
        assert_eq!(s, Severity::Warning);
    }
}
