//! Static route geometry.
//!
//! A route is an ordered list of waypoints, strictly increasing in
//! distance-along-route. Geographic coordinates for any scalar distance are
//! obtained by linear interpolation between the two surrounding waypoints.

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockId};
use crate::error::ValidationError;
use crate::train::Direction;

/// A geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// A station or timing point on the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Station code (e.g. "SC").
    pub code: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Distance from the route origin in km.
    pub km: f64,
}

impl Waypoint {
    /// Creates a waypoint.
    #[must_use]
    pub fn new(code: impl Into<String>, lat: f64, lng: f64, km: f64) -> Self {
        Self {
            code: code.into(),
            lat,
            lng,
            km,
        }
    }
}

/// An ordered, validated sequence of waypoints.
///
/// Deserialization goes through [`Route::new`], so a decoded route is always valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RouteDef")]
pub struct Route {
    id: String,
    waypoints: Vec<Waypoint>,
}

#[derive(Deserialize)]
struct RouteDef {
    id: String,
    waypoints: Vec<Waypoint>,
}

impl TryFrom<RouteDef> for Route {
    type Error = ValidationError;

    fn try_from(def: RouteDef) -> Result<Self, Self::Error> {
        Self::new(def.id, def.waypoints)
    }
}

impl Route {
    /// Creates a route.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidRoute` if fewer than two waypoints are
    /// given, the first waypoint is not at km 0, or distances are not strictly
    /// increasing.
    pub fn new(id: impl Into<String>, waypoints: Vec<Waypoint>) -> Result<Self, ValidationError> {
        if waypoints.len() < 2 {
            return Err(ValidationError::InvalidRoute {
                reason: format!("at least two waypoints required, got {}", waypoints.len()),
            });
        }
        if waypoints[0].km != 0.0 {
            return Err(ValidationError::InvalidRoute {
                reason: format!("route must start at km 0, got {}", waypoints[0].km),
            });
        }
        for pair in waypoints.windows(2) {
            if !(pair[1].km > pair[0].km) {
                return Err(ValidationError::InvalidRoute {
                    reason: format!(
                        "distances must be strictly increasing: {} ({} km) then {} ({} km)",
                        pair[0].code, pair[0].km, pair[1].code, pair[1].km
                    ),
                });
            }
        }
        Ok(Self {
            id: id.into(),
            waypoints,
        })
    }

    /// The Secunderabad - Kazipet corridor (137 km).
    #[must_use]
    pub fn sc_kzj() -> Self {
        let waypoints = vec![
            Waypoint::new("SC", 17.4334, 78.5044, 0.0),
            Waypoint::new("MJF", 17.4497, 78.5262, 5.0),
            Waypoint::new("CHZ", 17.4721, 78.5910, 12.0),
            Waypoint::new("GT", 17.4589, 78.6823, 22.0),
            Waypoint::new("BN", 17.4744, 78.7902, 35.0),
            Waypoint::new("BG", 17.5134, 78.8920, 50.0),
            Waypoint::new("ALER", 17.6534, 79.0520, 75.0),
            Waypoint::new("ZN", 17.7244, 79.1620, 95.0),
            Waypoint::new("KZJ", 17.9784, 79.4890, 137.0),
        ];
        Self {
            id: "SC-KZJ".to_string(),
            waypoints,
        }
    }

    /// Route identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Waypoints in order of increasing distance.
    #[must_use]
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Total route length in km.
    #[must_use]
    pub fn length_km(&self) -> f64 {
        self.waypoints.last().map_or(0.0, |w| w.km)
    }

    /// Interpolates the geographic position at `distance_km` along the route.
    ///
    /// Callers are expected to normalise the distance into `[0, length]`
    /// first; values outside that range resolve to the nearest endpoint.
    #[must_use]
    pub fn interpolate(&self, distance_km: f64) -> GeoPoint {
        let first = &self.waypoints[0];
        let last = &self.waypoints[self.waypoints.len() - 1];
        if distance_km <= first.km {
            return GeoPoint { lat: first.lat, lng: first.lng };
        }
        if distance_km >= last.km {
            return GeoPoint { lat: last.lat, lng: last.lng };
        }

        for pair in self.waypoints.windows(2) {
            let (p1, p2) = (&pair[0], &pair[1]);
            if p1.km <= distance_km && distance_km <= p2.km {
                let progress = (distance_km - p1.km) / (p2.km - p1.km);
                return GeoPoint {
                    lat: p1.lat + (p2.lat - p1.lat) * progress,
                    lng: p1.lng + (p2.lng - p1.lng) * progress,
                };
            }
        }

        GeoPoint { lat: last.lat, lng: last.lng }
    }

    /// Code of the next station in the direction of travel, if any remains.
    #[must_use]
    pub fn next_station(&self, distance_km: f64, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Eastbound => self
                .waypoints
                .iter()
                .find(|w| w.km > distance_km)
                .map(|w| w.code.as_str()),
            Direction::Westbound => self
                .waypoints
                .iter()
                .rev()
                .find(|w| w.km < distance_km)
                .map(|w| w.code.as_str()),
        }
    }

    /// One block per consecutive pair of stations, all free at the default limit.
    #[must_use]
    pub fn station_blocks(&self) -> Vec<Block> {
        self.waypoints
            .windows(2)
            .map(|pair| {
                let section = format!("{}-{}", pair[0].code, pair[1].code);
                Block::free(BlockId::new(format!("BLK-{section}")), section, pair[0].km, pair[1].km)
            })
            .collect()
    }
}
