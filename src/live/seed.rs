//! Default corridor fleet.

use crate::route::Route;
use crate::train::{Direction, Train, TrainStatus};

/// The three trains the corridor starts with, positioned on `route`.
#[must_use]
pub fn default_fleet(route: &Route) -> Vec<Train> {
    let specs = [
        ("12723", "Telangana Exp", 80.0, 10.0, TrainStatus::OnTime, Direction::Eastbound),
        ("17010", "Intercity Exp", 60.0, 5.0, TrainStatus::Delayed, Direction::Eastbound),
        ("12724", "Telangana Exp (Up)", 70.0, 120.0, TrainStatus::OnTime, Direction::Westbound),
    ];

    specs
        .into_iter()
        .map(|(id, name, speed, distance, status, direction)| {
            let mut train = Train {
                id: id.into(),
                name: name.to_string(),
                speed,
                distance,
                lat: 0.0,
                lng: 0.0,
                status,
                direction,
                route_id: route.id().to_string(),
                next_station: route.next_station(distance, direction).map(str::to_string),
            };
            train.set_position(route.interpolate(distance));
            train
        })
        .collect()
}
