//! Train identity and kinematic state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::route::GeoPoint;

/// Operational train number (e.g. "12723").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainId(String);

impl TrainId {
    /// Wraps a train number.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw train number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrainId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Operating status of a train.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainStatus {
    #[default]
    OnTime,
    Delayed,
    Stopped,
}

impl TrainStatus {
    /// Whether the live engine lets a train with this status move.
    #[must_use]
    pub const fn is_moving(self) -> bool {
        matches!(self, Self::OnTime)
    }
}

/// Direction of travel along the route.
///
/// Eastbound trains run towards increasing distance, westbound towards km 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    Eastbound,
    Westbound,
}

impl Direction {
    /// +1.0 for eastbound, -1.0 for westbound.
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Eastbound => 1.0,
            Self::Westbound => -1.0,
        }
    }
}

/// A train on the corridor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    /// Train number.
    pub id: TrainId,
    /// Display name.
    pub name: String,
    /// Commanded speed in km/h.
    pub speed: f64,
    /// Cumulative distance along the route in km.
    pub distance: f64,
    /// Latitude derived from `distance`.
    pub lat: f64,
    /// Longitude derived from `distance`.
    pub lng: f64,
    /// Operating status.
    pub status: TrainStatus,
    /// Direction of travel.
    #[serde(default)]
    pub direction: Direction,
    /// Route identifier.
    pub route_id: String,
    /// Code of the next station in the direction of travel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_station: Option<String>,
}

impl Train {
    /// Starts a builder.
    #[must_use]
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> TrainBuilder {
        TrainBuilder::new(id, name)
    }

    /// Geographic position as last derived.
    #[must_use]
    pub const fn position(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lng: self.lng,
        }
    }

    pub(crate) fn set_position(&mut self, point: GeoPoint) {
        self.lat = point.lat;
        self.lng = point.lng;
    }

    /// Forces the train to a standstill.
    pub fn halt(&mut self) {
        self.status = TrainStatus::Stopped;
        self.speed = 0.0;
    }
}

/// Builder for [`Train`].
#[derive(Debug, Clone)]
pub struct TrainBuilder {
    train: Train,
}

impl TrainBuilder {
    fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            train: Train {
                id: TrainId::new(id),
                name: name.into(),
                speed: 0.0,
                distance: 0.0,
                lat: 0.0,
                lng: 0.0,
                status: TrainStatus::OnTime,
                direction: Direction::Eastbound,
                route_id: "SC-KZJ".to_string(),
                next_station: None,
            },
        }
    }

    /// Sets the commanded speed in km/h.
    #[must_use]
    pub const fn speed(mut self, speed: f64) -> Self {
        self.train.speed = speed;
        self
    }

    /// Sets the distance along the route in km.
    #[must_use]
    pub const fn distance(mut self, distance: f64) -> Self {
        self.train.distance = distance;
        self
    }

    #[must_use]
    pub const fn status(mut self, status: TrainStatus) -> Self {
        self.train.status = status;
        self
    }

    #[must_use]
    pub const fn direction(mut self, direction: Direction) -> Self {
        self.train.direction = direction;
        self
    }

    #[must_use]
    pub fn route_id(mut self, route_id: impl Into<String>) -> Self {
        self.train.route_id = route_id.into();
        self
    }

    /// Validates and returns the train.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidSpeed` for a negative or non-finite speed.
    pub fn build(self) -> Result<Train, ValidationError> {
        let speed = self.train.speed;
        if !speed.is_finite() || speed < 0.0 {
            return Err(ValidationError::InvalidSpeed { value: speed });
        }
        Ok(self.train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_negative_speed() {
        let err = Train::builder("1", "t").speed(-1.0).build().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSpeed { .. }));
        assert!(Train::builder("1", "t").speed(f64::NAN).build().is_err());
    }

    #[test]
    fn status_serializes_as_screaming_snake() {
        assert_eq!(serde_json::to_string(&TrainStatus::OnTime).unwrap(), "\"ON_TIME\"");
        let s: TrainStatus = serde_json::from_str("\"DELAYED\"").unwrap();
        assert_eq!(s, TrainStatus::Delayed);
    }

    #[test]
    fn halt_zeroes_speed() {
        let mut t = Train::builder("1", "t").speed(80.0).build().unwrap();
        t.halt();
        assert_eq!(t.status, TrainStatus::Stopped);
        assert_eq!(t.speed, 0.0);
    }

    #[test]
    fn only_on_time_trains_move() {
        assert!(TrainStatus::OnTime.is_moving());
        assert!(!TrainStatus::Delayed.is_moving());
        assert!(!TrainStatus::Stopped.is_moving());
    }
}
